use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::app::{NodeId, SpatialGraph};
use crate::content::{Ambience, EnvInfo, SceneIndex, SceneKind, Scenery};
use crate::scripting::SceneVariables;

use super::actor::ActorRegistry;
use super::zone::{PointRegistry, ZoneRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneryId(pub u64);

/// Position of a scene in its family. Island scenes are either `Main` (and own
/// the side-scene map, possibly empty) or `Side`; isometric scenes are
/// `Standalone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneLink {
    Standalone,
    Main {
        side_scenes: BTreeMap<SceneIndex, SceneId>,
    },
    Side {
        parent: SceneId,
    },
}

#[derive(Debug)]
pub struct Scene {
    pub(super) id: SceneId,
    pub(super) index: SceneIndex,
    pub(super) kind: SceneKind,
    pub(super) island: Option<String>,
    pub(super) ambience: Ambience,
    pub(super) env: EnvInfo,
    pub(super) scenery: SceneryId,
    pub(super) family_root: NodeId,
    pub(super) node: NodeId,
    pub(super) actors: ActorRegistry,
    pub(super) zones: ZoneRegistry,
    pub(super) points: PointRegistry,
    pub(super) cube_vars: SceneVariables,
    pub(super) cube_len: usize,
    pub(super) used_game_vars: Vec<u16>,
    pub(super) link: SceneLink,
    pub(super) active: bool,
}

impl Scene {
    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn index(&self) -> SceneIndex {
        self.index
    }

    pub fn kind(&self) -> &SceneKind {
        &self.kind
    }

    pub fn is_island(&self) -> bool {
        self.kind.is_island()
    }

    /// Island name after override rules; `None` for isometric scenes.
    pub fn island(&self) -> Option<&str> {
        self.island.as_deref()
    }

    pub fn ambience(&self) -> &Ambience {
        &self.ambience
    }

    pub fn env(&self) -> EnvInfo {
        self.env
    }

    pub fn scenery_id(&self) -> SceneryId {
        self.scenery
    }

    /// Root shared by the whole family; holds the scenery and every scene node.
    pub fn family_root(&self) -> NodeId {
        self.family_root
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    pub fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    pub fn points(&self) -> &PointRegistry {
        &self.points
    }

    pub fn cube_vars(&self) -> &SceneVariables {
        &self.cube_vars
    }

    /// Game variable indices referenced by this scene's scripts, ascending.
    pub fn used_game_vars(&self) -> &[u16] {
        &self.used_game_vars
    }

    pub fn link(&self) -> &SceneLink {
        &self.link
    }

    pub fn parent(&self) -> Option<SceneId> {
        match self.link {
            SceneLink::Side { parent } => Some(parent),
            _ => None,
        }
    }

    pub fn side_scene_indices(&self) -> Vec<SceneIndex> {
        match &self.link {
            SceneLink::Main { side_scenes } => side_scenes.keys().copied().collect(),
            _ => Vec::new(),
        }
    }

    pub fn side_scene(&self, index: SceneIndex) -> Option<SceneId> {
        match &self.link {
            SceneLink::Main { side_scenes } => side_scenes.get(&index).copied(),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(super) fn reset_variables(&mut self) {
        self.cube_vars = SceneVariables::with_len(self.cube_len);
    }
}

/// Sole owner of loaded scenes and sceneries; relations between scenes are
/// stored as ids.
#[derive(Debug, Default)]
pub struct SceneArena {
    next_scene: u64,
    next_scenery: u64,
    scenes: HashMap<SceneId, Scene>,
    sceneries: HashMap<SceneryId, Scenery>,
}

impl SceneArena {
    pub(super) fn allocate_scene_id(&mut self) -> SceneId {
        let id = SceneId(self.next_scene);
        self.next_scene = self.next_scene.saturating_add(1);
        id
    }

    pub(super) fn insert_scenery(&mut self, scenery: Scenery) -> SceneryId {
        let id = SceneryId(self.next_scenery);
        self.next_scenery = self.next_scenery.saturating_add(1);
        self.sceneries.insert(id, scenery);
        id
    }

    pub(super) fn insert_scene(&mut self, scene: Scene) {
        self.scenes.insert(scene.id, scene);
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenery_count(&self) -> usize {
        self.sceneries.len()
    }

    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    pub fn get_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.get_mut(&id)
    }

    pub fn scenery(&self, id: SceneryId) -> Option<&Scenery> {
        self.sceneries.get(&id)
    }

    /// Main scene of the family `id` belongs to.
    pub fn main_of(&self, id: SceneId) -> SceneId {
        self.scenes
            .get(&id)
            .and_then(Scene::parent)
            .unwrap_or(id)
    }

    /// The main scene followed by its side scenes in index order.
    pub fn family_of(&self, id: SceneId) -> Vec<SceneId> {
        let main = self.main_of(id);
        let mut family = vec![main];
        if let Some(SceneLink::Main { side_scenes }) = self.scenes.get(&main).map(Scene::link) {
            family.extend(side_scenes.values().copied());
        }
        family
    }

    /// Any scene of the family of `id` with the given index.
    pub fn find_in_family(&self, id: SceneId, index: SceneIndex) -> Option<SceneId> {
        self.family_of(id)
            .into_iter()
            .find(|member| self.scenes.get(member).is_some_and(|scene| scene.index == index))
    }

    /// Makes side scene `incoming` the main scene of its family: it takes over
    /// the side-scene map, minus itself and plus `outgoing` under its own index.
    /// Returns `false` when `incoming` is not a side scene of `outgoing`.
    pub(super) fn promote_side_scene(&mut self, outgoing: SceneId, incoming: SceneId) -> bool {
        let Some(outgoing_scene) = self.scenes.get_mut(&outgoing) else {
            return false;
        };
        let outgoing_index = outgoing_scene.index;
        let mut side_scenes = match &mut outgoing_scene.link {
            SceneLink::Main { side_scenes } if side_scenes.values().any(|id| *id == incoming) => {
                std::mem::take(side_scenes)
            }
            _ => return false,
        };
        outgoing_scene.link = SceneLink::Side { parent: incoming };

        side_scenes.retain(|_, id| *id != incoming);
        side_scenes.insert(outgoing_index, outgoing);
        for sibling in side_scenes.values() {
            if let Some(scene) = self.scenes.get_mut(sibling) {
                scene.link = SceneLink::Side { parent: incoming };
            }
        }
        if let Some(scene) = self.scenes.get_mut(&incoming) {
            scene.link = SceneLink::Main { side_scenes };
        }
        true
    }

    /// Drops the family of `id`, detaching its nodes, and releases sceneries no
    /// remaining scene references.
    pub(super) fn remove_family(&mut self, id: SceneId, graph: &mut dyn SpatialGraph) -> usize {
        let family = self.family_of(id);
        let mut removed = 0usize;
        let mut root = None;
        for member in family {
            if let Some(scene) = self.scenes.remove(&member) {
                root = Some(scene.family_root);
                removed += 1;
            }
        }
        if let Some(root) = root {
            graph.remove_node(root);
        }

        let scenes = &self.scenes;
        let before = self.sceneries.len();
        self.sceneries
            .retain(|scenery, _| scenes.values().any(|scene| scene.scenery == *scenery));
        debug!(
            scenes = removed,
            sceneries = before - self.sceneries.len(),
            "scene_family_removed"
        );
        removed
    }
}
