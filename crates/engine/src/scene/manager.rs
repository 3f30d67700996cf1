use std::cell::{Cell, RefCell};

use tracing::{debug, info, warn};

use crate::app::Host;
use crate::content::{ContentSource, LoadError, SceneIndex, SceneMap, ZoneKind};
use crate::scripting::{run_scene_tick, ScriptContext, ScriptEvent, TraceStep};
use crate::session::GameSession;

use super::actor::PROTAGONIST;
use super::arena::{Scene, SceneArena, SceneId};
use super::assembler::{attach_family, load_scene, LoadRequest, SceneConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoOutcome {
    /// A load was in flight, or the scene is already current.
    Ignored,
    /// In-place switch to a side scene of the current family; nothing loaded.
    Swapped(SceneIndex),
    Loaded(SceneIndex),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub scene: Option<SceneIndex>,
    pub commands_executed: usize,
    pub events: Vec<ScriptEvent>,
}

struct ManagerState {
    arena: SceneArena,
    host: Host,
    active: Option<SceneId>,
}

impl ManagerState {
    fn active_scene(&self) -> Option<&Scene> {
        self.active.and_then(|id| self.arena.get(id))
    }

    fn swap_to_side(&mut self, outgoing: SceneId, incoming: SceneId) {
        let graph = &mut *self.host.graph;
        if let Some(scene) = self.arena.get_mut(outgoing) {
            if let Some(protagonist) = scene.actors.get_mut(PROTAGONIST) {
                protagonist.kill(graph);
            }
            scene.active = false;
        }
        self.arena.promote_side_scene(outgoing, incoming);
        let mut track = None;
        if let Some(scene) = self.arena.get_mut(incoming) {
            if let Some(protagonist) = scene.actors.get_mut(PROTAGONIST) {
                protagonist.revive(graph);
            }
            scene.active = true;
            track = Some(scene.ambience.music_track);
        }
        self.active = Some(incoming);
        if let Some(track) = track {
            self.host.resume_music(track);
        }
    }

    fn activate_loaded(&mut self, id: SceneId) {
        let Some(scene) = self.arena.get_mut(id) else {
            return;
        };
        scene.active = true;
        let root = scene.family_root;
        let track = scene.ambience.music_track;
        let index = scene.index;
        let scenery = scene.scenery;
        let focus = scene.actors.get(PROTAGONIST).map(|actor| actor.position);

        self.active = Some(id);
        self.host.graph.set_active_root(Some(root));
        if let Some(scenery) = self.arena.scenery(scenery) {
            self.host.graph.apply_scenery_props(&scenery.props);
        }
        self.host.resume_music(track);
        self.host.camera.reinitialize(index, focus);
    }
}

/// Clears the loading flag when dropped. A load that never committed (failed
/// or was dropped mid-flight) hands activity back to the previous scene.
struct LoadingGuard<'m> {
    manager: &'m SceneManager,
    previous: Option<SceneId>,
    committed: bool,
}

impl<'m> LoadingGuard<'m> {
    fn begin(manager: &'m SceneManager, previous: Option<SceneId>) -> Self {
        manager.loading.set(true);
        Self {
            manager,
            previous,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(previous) = self.previous {
                match self.manager.state.try_borrow_mut() {
                    Ok(mut state) => {
                        if let Some(scene) = state.arena.get_mut(previous) {
                            scene.active = true;
                        }
                    }
                    Err(_) => warn!(?previous, "previous_scene_not_restored"),
                }
            }
        }
        self.manager.loading.set(false);
    }
}

/// Owns the loaded scene families and drives transitions between them. All
/// methods take `&self` so that a `goto` awaiting content does not lock out
/// observers; re-entrant transitions are rejected by the loading flag.
pub struct SceneManager {
    source: Box<dyn ContentSource>,
    map: SceneMap,
    config: SceneConfig,
    state: RefCell<ManagerState>,
    loading: Cell<bool>,
}

impl SceneManager {
    pub async fn new(
        source: Box<dyn ContentSource>,
        host: Host,
        config: SceneConfig,
    ) -> Result<Self, LoadError> {
        let map = source.load_scene_map().await?;
        info!(scenes = map.len(), language = %config.language, "scene_map_loaded");
        Ok(Self::with_map(source, map, host, config))
    }

    pub fn with_map(
        source: Box<dyn ContentSource>,
        map: SceneMap,
        host: Host,
        config: SceneConfig,
    ) -> Self {
        Self {
            source,
            map,
            config,
            state: RefCell::new(ManagerState {
                arena: SceneArena::default(),
                host,
                active: None,
            }),
            loading: Cell::new(false),
        }
    }

    pub fn scene_map(&self) -> &SceneMap {
        &self.map
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    pub fn active_index(&self) -> Option<SceneIndex> {
        self.state.borrow().active_scene().map(Scene::index)
    }

    pub fn with_active_scene<R>(&self, f: impl FnOnce(&Scene) -> R) -> Option<R> {
        self.state.borrow().active_scene().map(f)
    }

    /// Looks `index` up within the active scene's family.
    pub fn with_scene<R>(&self, index: SceneIndex, f: impl FnOnce(&Scene) -> R) -> Option<R> {
        let state = self.state.borrow();
        let active = state.active?;
        let id = state.arena.find_in_family(active, index)?;
        state.arena.get(id).map(f)
    }

    pub fn with_arena<R>(&self, f: impl FnOnce(&SceneArena) -> R) -> R {
        f(&self.state.borrow().arena)
    }

    pub fn active_used_game_vars(&self) -> Vec<u16> {
        self.with_active_scene(|scene| scene.used_game_vars().to_vec())
            .unwrap_or_default()
    }

    /// Transitions to scene `index`. Dropped while another transition is
    /// loading, and when `index` is already current unless `force` is set.
    pub async fn goto(
        &self,
        session: &GameSession,
        index: SceneIndex,
        force: bool,
    ) -> Result<GotoOutcome, LoadError> {
        if self.loading.get() {
            debug!(scene = %index, reason = "loading", "goto_ignored");
            return Ok(GotoOutcome::Ignored);
        }
        if !force && self.active_index() == Some(index) {
            debug!(scene = %index, reason = "current", "goto_ignored");
            return Ok(GotoOutcome::Ignored);
        }
        if self.map.entry(index).is_none() {
            return Err(LoadError::UnknownScene(index));
        }

        let previous = {
            let mut state = self.state.borrow_mut();
            let previous = state.active;
            let side = previous.and_then(|outgoing| {
                let incoming = state.arena.get(outgoing)?.side_scene(index)?;
                Some((outgoing, incoming))
            });
            if let Some((outgoing, incoming)) = side {
                state.swap_to_side(outgoing, incoming);
                info!(scene = %index, "side_scene_swapped");
                return Ok(GotoOutcome::Swapped(index));
            }
            if let Some(id) = previous {
                if let Some(scene) = state.arena.get_mut(id) {
                    scene.active = false;
                }
            }
            previous
        };

        let mut guard = LoadingGuard::begin(self, previous);
        info!(scene = %index, force, "scene_loading");
        let request = LoadRequest {
            source: self.source.as_ref(),
            map: &self.map,
            config: &self.config,
            game_vars: &session.game_vars,
        };
        let loaded = match load_scene(&request, index, None).await {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!(scene = %index, error = %error, "scene_load_failed");
                return Err(error);
            }
        };

        let family = loaded.family_len();
        {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            if let Some(previous) = previous {
                state.arena.remove_family(previous, state.host.graph.as_mut());
            }
            let id = attach_family(loaded, &mut state.arena, state.host.graph.as_mut(), &self.config);
            state.activate_loaded(id);
        }
        guard.commit();
        info!(scene = %index, family, "scene_loaded");
        Ok(GotoOutcome::Loaded(index))
    }

    /// Moves to the following scene index, wrapping to 0 after the last one.
    pub async fn next(&self, session: &GameSession) -> Result<GotoOutcome, LoadError> {
        let Some(current) = self.active_index() else {
            return Ok(GotoOutcome::Ignored);
        };
        self.goto(session, self.map.next(current), false).await
    }

    pub async fn previous(&self, session: &GameSession) -> Result<GotoOutcome, LoadError> {
        let Some(current) = self.active_index() else {
            return Ok(GotoOutcome::Ignored);
        };
        self.goto(session, self.map.previous(current), false).await
    }

    pub fn tick(&self, session: &mut GameSession) -> TickReport {
        self.tick_with_trace(session, None)
    }

    /// Tracks the protagonist against the active scene's zones, then runs one
    /// tick of scripts. Nothing runs while a transition is loading.
    pub fn tick_with_trace(
        &self,
        session: &mut GameSession,
        trace: Option<&mut Vec<TraceStep>>,
    ) -> TickReport {
        if self.loading.get() {
            return TickReport::default();
        }
        let mut state = self.state.borrow_mut();
        let ManagerState {
            arena,
            host,
            active,
        } = &mut *state;
        let Some(id) = *active else {
            return TickReport::default();
        };
        let Some(scene) = arena.get_mut(id) else {
            return TickReport::default();
        };

        let mut events = Vec::new();
        let tracked = scene
            .actors
            .get(PROTAGONIST)
            .filter(|protagonist| protagonist.is_alive())
            .map(|protagonist| protagonist.position);
        if let Some(position) = tracked {
            for zone in scene.zones.track_position(position) {
                if let Some(ZoneKind::ChangeScene { target }) =
                    scene.zones.get(zone).map(|zone| zone.kind())
                {
                    debug!(scene = %scene.index, zone, target = %target, "change_scene_zone_entered");
                    events.push(ScriptEvent::SceneChangeRequested {
                        index: target,
                        by: PROTAGONIST,
                    });
                }
            }
        }

        let Scene {
            index,
            actors,
            zones,
            points,
            cube_vars,
            ..
        } = scene;
        let mut ctx = ScriptContext {
            scene: *index,
            cube_vars,
            game_vars: &mut session.game_vars,
            actors,
            zones,
            points,
            graph: host.graph.as_mut(),
            animator: host.animator.as_mut(),
            step_budget: self.config.step_budget,
            trace,
        };
        let summary = run_scene_tick(&mut ctx);
        for event in &summary.events {
            match event {
                ScriptEvent::ActorKilled { actor, by } => {
                    debug!(scene = %index, actor = %actor, by = %by, "actor_killed")
                }
                ScriptEvent::ActorRevived { actor, by } => {
                    debug!(scene = %index, actor = %actor, by = %by, "actor_revived")
                }
                ScriptEvent::SceneChangeRequested { index: target, by } => {
                    debug!(scene = %index, target = %target, by = %by, "scene_change_requested")
                }
            }
        }
        events.extend(summary.events);

        TickReport {
            scene: Some(*index),
            commands_executed: summary.commands_executed,
            events,
        }
    }

    /// Puts every actor of the active scene back to its loaded state and
    /// recreates the scene variable bank.
    pub fn reset_active(&self) -> bool {
        if self.loading.get() {
            return false;
        }
        let mut state = self.state.borrow_mut();
        let ManagerState {
            arena,
            host,
            active,
        } = &mut *state;
        let Some(id) = *active else {
            return false;
        };
        let Some(scene) = arena.get_mut(id) else {
            return false;
        };
        for actor in scene.actors.iter_mut() {
            actor.reset(host.graph.as_mut());
        }
        scene.zones.reset();
        scene.reset_variables();
        let focus = scene.actors.get(PROTAGONIST).map(|actor| actor.position);
        host.camera.reinitialize(scene.index, focus);
        info!(scene = %scene.index, "scene_reset");
        true
    }

    /// Tears down the active family and clears the view.
    pub fn unload(&self) -> bool {
        if self.loading.get() {
            return false;
        }
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let Some(active) = state.active.take() else {
            return false;
        };
        state.arena.remove_family(active, state.host.graph.as_mut());
        state.host.graph.set_active_root(None);
        info!("scene_unloaded");
        true
    }
}
