use std::fmt;

use crate::app::{NodeId, SpatialGraph, Vec3};
use crate::content::ActorData;
use crate::scripting::{Script, ScriptError, ScriptKind, ScriptProgram};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorIndex(pub usize);

impl fmt::Display for ActorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of the protagonist in every scene.
pub const PROTAGONIST: ActorIndex = ActorIndex(0);

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActorSpawn {
    position: Vec3,
    behaviour: u8,
    anim: u16,
}

#[derive(Debug, Clone)]
pub struct Actor {
    index: ActorIndex,
    name: String,
    node: Option<NodeId>,
    spawn: ActorSpawn,
    pub position: Vec3,
    pub behaviour: u8,
    pub anim: u16,
    alive: bool,
    life: Script,
    moves: Script,
}

impl Actor {
    /// Compiles the actor's life and move scripts and records its spawn state.
    pub fn from_data(
        index: ActorIndex,
        data: &ActorData,
        node: Option<NodeId>,
    ) -> Result<Self, ScriptError> {
        let life = ScriptProgram::compile(data.life.clone())?;
        let moves = ScriptProgram::compile(data.moves.clone())?;
        Ok(Self::with_programs(index, data, node, life, moves))
    }

    pub fn with_programs(
        index: ActorIndex,
        data: &ActorData,
        node: Option<NodeId>,
        life: ScriptProgram,
        moves: ScriptProgram,
    ) -> Self {
        Self {
            index,
            name: data.name.clone(),
            node,
            spawn: ActorSpawn {
                position: data.position,
                behaviour: data.behaviour,
                anim: data.anim,
            },
            position: data.position,
            behaviour: data.behaviour,
            anim: data.anim,
            alive: true,
            life: Script::new(life),
            moves: Script::new(moves),
        }
    }

    pub fn index(&self) -> ActorIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn script(&self, kind: ScriptKind) -> &Script {
        match kind {
            ScriptKind::Life => &self.life,
            ScriptKind::Move => &self.moves,
        }
    }

    pub(crate) fn script_mut(&mut self, kind: ScriptKind) -> &mut Script {
        match kind {
            ScriptKind::Life => &mut self.life,
            ScriptKind::Move => &mut self.moves,
        }
    }

    /// Suspends the actor's scripts and hides it; the entity stays in place.
    pub fn kill(&mut self, graph: &mut dyn SpatialGraph) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        if let Some(node) = self.node {
            graph.set_visible(node, false);
        }
        true
    }

    /// Wakes the actor: both scripts restart from their entry point.
    pub fn revive(&mut self, graph: &mut dyn SpatialGraph) -> bool {
        if self.alive {
            return false;
        }
        self.alive = true;
        self.life.reset();
        self.moves.reset();
        if let Some(node) = self.node {
            graph.set_visible(node, true);
        }
        true
    }

    pub fn move_to(&mut self, position: Vec3, graph: &mut dyn SpatialGraph) {
        self.position = position;
        if let Some(node) = self.node {
            graph.set_position(node, position);
        }
    }

    /// Back to the state the actor was loaded in.
    pub fn reset(&mut self, graph: &mut dyn SpatialGraph) {
        self.move_to(self.spawn.position, graph);
        self.behaviour = self.spawn.behaviour;
        self.anim = self.spawn.anim;
        self.alive = true;
        self.life.reset();
        self.moves.reset();
        if let Some(node) = self.node {
            graph.set_visible(node, true);
        }
    }
}

/// Actors of one scene in load order; an actor's index is its position.
#[derive(Debug, Clone, Default)]
pub struct ActorRegistry {
    actors: Vec<Actor>,
}

impl ActorRegistry {
    pub fn from_actors(actors: Vec<Actor>) -> Self {
        debug_assert!(actors
            .iter()
            .enumerate()
            .all(|(position, actor)| actor.index.0 == position));
        Self { actors }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn get(&self, index: ActorIndex) -> Option<&Actor> {
        self.actors.get(index.0)
    }

    pub fn get_mut(&mut self, index: ActorIndex) -> Option<&mut Actor> {
        self.actors.get_mut(index.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.actors.iter_mut()
    }
}
