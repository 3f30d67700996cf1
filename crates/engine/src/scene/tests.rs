use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::{pin, Pin};
use std::rc::Rc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::executor::block_on;
use serde_json::{json, Value};

use crate::app::{
    ActorAnimator, CameraController, Host, MusicPlayer, NodeId, NodeTree, SpatialGraph, Vec3,
};
use crate::content::{
    ActorAsset, ActorData, ActorVisual, Ambience, ContentSource, EnvInfo, IslandOverride,
    IslandSlot, LoadError, PointData, SceneData, SceneIndex, SceneKind, SceneMap, SceneMapEntry,
    Scenery, SceneryRequest, Section, ZoneData, ZoneKind,
};
use crate::scripting::{ActorRef, Command, Comparison, Condition, Operand, ScriptEvent, ScriptKind};
use crate::session::GameSession;

use super::*;

const FAILING_SCENE: u32 = 2;
const MALFORMED_ACTOR_SCENE: u32 = 6;
const MISSING_SECTION_SCENE: u32 = 7;
const BROKEN_SIDE_SCENE: u32 = 8;
const LAST_SCENE: u32 = 9;
const OVERRIDE_VAR: u16 = 40;
const REVIVE_VAR: u16 = 30;
const WALK_VAR: u16 = 31;

/// Pending exactly once, then ready.
#[derive(Default)]
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[derive(Default)]
struct LoadCounters {
    scene_data: Cell<usize>,
    actors: Cell<usize>,
    sceneries: RefCell<Vec<String>>,
}

struct MemorySource {
    map: SceneMap,
    scenes: HashMap<u32, SceneData>,
    sceneries: HashMap<String, Scenery>,
    counters: Rc<LoadCounters>,
    yield_on_fetch: bool,
}

#[async_trait(?Send)]
impl ContentSource for MemorySource {
    async fn load_scene_map(&self) -> Result<SceneMap, LoadError> {
        Ok(self.map.clone())
    }

    async fn load_scene_data(
        &self,
        _language: &str,
        index: SceneIndex,
    ) -> Result<SceneData, LoadError> {
        self.counters
            .scene_data
            .set(self.counters.scene_data.get() + 1);
        if self.yield_on_fetch {
            YieldNow::default().await;
        }
        self.scenes
            .get(&index.0)
            .cloned()
            .ok_or_else(|| LoadError::Unavailable {
                what: format!("scene {index}"),
                reason: "not authored".to_string(),
            })
    }

    async fn load_actor(
        &self,
        env: EnvInfo,
        _ambience: &Ambience,
        data: ActorData,
    ) -> Result<ActorAsset, LoadError> {
        self.counters.actors.set(self.counters.actors.get() + 1);
        let visual = data.model.clone().map(|model| ActorVisual { model, env });
        Ok(ActorAsset { data, visual })
    }

    async fn load_scenery(&self, request: SceneryRequest<'_>) -> Result<Scenery, LoadError> {
        let key = match request {
            SceneryRequest::Island { island, .. } => format!("island_{island}"),
            SceneryRequest::Isometric { iso_index } => format!("iso_{iso_index}"),
        };
        self.counters.sceneries.borrow_mut().push(key.clone());
        self.sceneries
            .get(&key)
            .cloned()
            .ok_or(LoadError::Unavailable {
                what: key,
                reason: "not authored".to_string(),
            })
    }
}

#[derive(Clone, Default)]
struct SharedTree(Rc<RefCell<NodeTree>>);

impl SpatialGraph for SharedTree {
    fn create_node(&mut self, name: &str) -> NodeId {
        self.0.borrow_mut().create_node(name)
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.0.borrow_mut().add_child(parent, child);
    }

    fn remove_node(&mut self, node: NodeId) {
        self.0.borrow_mut().remove_node(node);
    }

    fn set_position(&mut self, node: NodeId, position: Vec3) {
        self.0.borrow_mut().set_position(node, position);
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        self.0.borrow_mut().set_visible(node, visible);
    }

    fn set_active_root(&mut self, root: Option<NodeId>) {
        self.0.borrow_mut().set_active_root(root);
    }

    fn apply_scenery_props(&mut self, props: &HashMap<String, Value>) {
        self.0.borrow_mut().apply_scenery_props(props);
    }
}

#[derive(Default)]
struct MusicLog {
    playing: Cell<bool>,
    loaded: RefCell<Vec<u16>>,
    menu_stops: Cell<usize>,
}

struct AmbienceMusic(Rc<MusicLog>);

impl MusicPlayer for AmbienceMusic {
    fn is_playing(&self) -> bool {
        self.0.playing.get()
    }

    fn load(&mut self, track: u16) {
        self.0.loaded.borrow_mut().push(track);
    }

    fn play(&mut self) {
        self.0.playing.set(true);
    }

    fn stop(&mut self) {
        self.0.playing.set(false);
    }
}

struct MenuMusic(Rc<MusicLog>);

impl MusicPlayer for MenuMusic {
    fn is_playing(&self) -> bool {
        false
    }

    fn load(&mut self, _track: u16) {}

    fn play(&mut self) {}

    fn stop(&mut self) {
        self.0.menu_stops.set(self.0.menu_stops.get() + 1);
    }
}

type CameraLog = Rc<RefCell<Vec<(SceneIndex, Option<Vec3>)>>>;

struct RecordingCamera(CameraLog);

impl CameraController for RecordingCamera {
    fn reinitialize(&mut self, scene: SceneIndex, focus: Option<Vec3>) {
        self.0.borrow_mut().push((scene, focus));
    }
}

struct NullAnimator;

impl ActorAnimator for NullAnimator {
    fn play_anim(&mut self, _scene: SceneIndex, _actor: ActorIndex, _anim: u16) {}

    fn set_behaviour(&mut self, _scene: SceneIndex, _actor: ActorIndex, _behaviour: u8) {}
}

fn island(name: &str, section: usize, variant: u32) -> SceneKind {
    SceneKind::Island(IslandSlot {
        island: name.to_string(),
        section,
        variant,
    })
}

/// 0, 1: isometric. 2: isometric without scenery (fails to load).
/// 3, 4: island X variant 1, main and side. 5: island CITADEL, overridable.
/// 6: isometric with an actor whose script jumps out of range.
/// 7, 8: island Y variant 1; the side scene 8 names a section Y lacks.
/// 9: isometric, last in the map.
fn scene_map() -> SceneMap {
    let kinds = [
        SceneKind::Isometric { iso_index: 0 },
        SceneKind::Isometric { iso_index: 1 },
        SceneKind::Isometric { iso_index: 7 },
        island("X", 0, 1),
        island("X", 1, 1),
        island("CITADEL", 0, 2),
        SceneKind::Isometric { iso_index: 0 },
        island("Y", 0, 1),
        island("Y", 3, 1),
        SceneKind::Isometric { iso_index: 1 },
    ];
    let entries = kinds
        .into_iter()
        .enumerate()
        .map(|(index, kind)| SceneMapEntry {
            index: SceneIndex(index as u32),
            kind,
        })
        .collect();
    let islands = HashMap::from([(
        "CITADEL_RUINS".to_string(),
        EnvInfo {
            sky_color: [10, 20, 30],
            fog_density: 0.5,
        },
    )]);
    let overrides = vec![IslandOverride {
        game_var: OVERRIDE_VAR,
        from: "CITADEL".to_string(),
        to: "CITADEL_RUINS".to_string(),
    }];
    SceneMap::from_parts(entries, islands, overrides)
}

fn actor(name: &str, model: Option<&str>, life: Vec<Command>) -> ActorData {
    ActorData {
        name: name.to_string(),
        model: model.map(str::to_string),
        position: Vec3::new(1.0, 0.0, 1.0),
        behaviour: 0,
        anim: 0,
        life,
        moves: Vec::new(),
    }
}

fn game_var_is(index: u16, value: i32) -> Condition {
    Condition::Compare {
        lhs: Operand::VarGame(index),
        test: Comparison::Eq,
        rhs: Operand::Literal(value),
    }
}

fn scene(music_track: u16, actors: Vec<ActorData>) -> SceneData {
    SceneData {
        ambience: Ambience {
            music_track,
            sky_color: None,
            fog_density: None,
        },
        actors,
        zones: Vec::new(),
        points: Vec::new(),
    }
}

fn hero() -> ActorData {
    actor("twinsen", Some("twinsen"), vec![Command::Yield])
}

fn scenes() -> HashMap<u32, SceneData> {
    let mut main = scene(
        5,
        vec![
            actor(
                "twinsen",
                Some("twinsen"),
                vec![
                    Command::If {
                        condition: game_var_is(WALK_VAR, 1),
                        else_target: 2,
                    },
                    Command::SetPosition {
                        position: Vec3::new(11.0, 1.0, 11.0),
                    },
                    Command::Restart,
                ],
            ),
            actor(
                "guard",
                Some("guard"),
                vec![Command::Yield, Command::Yield, Command::Yield, Command::Stop],
            ),
            actor(
                "warden",
                None,
                vec![
                    Command::If {
                        condition: game_var_is(REVIVE_VAR, 1),
                        else_target: 4,
                    },
                    Command::Kill {
                        actor: ActorRef::Index(1),
                    },
                    Command::Revive {
                        actor: ActorRef::Index(1),
                    },
                    Command::SetVarGame {
                        index: REVIVE_VAR,
                        value: 0,
                    },
                    Command::Restart,
                ],
            ),
        ],
    );
    main.zones.push(ZoneData {
        name: "gate".to_string(),
        kind: ZoneKind::ChangeScene {
            target: SceneIndex(0),
        },
        min: Vec3::new(10.0, 0.0, 10.0),
        max: Vec3::new(12.0, 2.0, 12.0),
    });
    main.points.push(PointData {
        name: "door".to_string(),
        position: Vec3::new(3.0, 0.0, 4.0),
    });

    HashMap::from([
        (0, scene(1, vec![hero()])),
        (
            1,
            scene(
                2,
                vec![actor(
                    "twinsen",
                    Some("twinsen"),
                    vec![
                        Command::SetVarCube {
                            index: 4,
                            value: 9,
                        },
                        Command::Stop,
                    ],
                )],
            ),
        ),
        (FAILING_SCENE, scene(1, vec![hero()])),
        (3, main),
        (
            4,
            scene(
                6,
                vec![hero(), actor("fisher", Some("fisher"), vec![Command::Yield])],
            ),
        ),
        (5, scene(7, vec![hero()])),
        (
            MALFORMED_ACTOR_SCENE,
            scene(
                1,
                vec![
                    hero(),
                    actor("lost", None, vec![Command::Jump { target: 9 }]),
                ],
            ),
        ),
        (MISSING_SECTION_SCENE, scene(8, vec![hero()])),
        (BROKEN_SIDE_SCENE, scene(8, vec![hero()])),
        (LAST_SCENE, scene(2, vec![hero()])),
    ])
}

fn scenery(name: &str, sections: Vec<Section>) -> Scenery {
    Scenery {
        name: name.to_string(),
        sections,
        props: HashMap::from([("name".to_string(), json!(name))]),
    }
}

fn sceneries() -> HashMap<String, Scenery> {
    let origin = Section { x: 0.0, z: 0.0 };
    HashMap::from([
        ("iso_0".to_string(), scenery("iso_0", Vec::new())),
        ("iso_1".to_string(), scenery("iso_1", Vec::new())),
        (
            "island_X".to_string(),
            scenery("X", vec![origin, Section { x: 32.0, z: 0.0 }]),
        ),
        ("island_CITADEL".to_string(), scenery("CITADEL", vec![origin])),
        ("island_Y".to_string(), scenery("Y", vec![origin])),
        (
            "island_CITADEL_RUINS".to_string(),
            scenery("CITADEL_RUINS", vec![origin]),
        ),
    ])
}

struct Harness {
    manager: SceneManager,
    session: GameSession,
    tree: Rc<RefCell<NodeTree>>,
    counters: Rc<LoadCounters>,
    music: Rc<MusicLog>,
    camera: CameraLog,
}

impl Harness {
    fn new() -> Self {
        Self::build(SceneConfig::default(), false)
    }

    fn build(config: SceneConfig, yield_on_fetch: bool) -> Self {
        let tree = SharedTree::default();
        let counters = Rc::new(LoadCounters::default());
        let music = Rc::new(MusicLog::default());
        let camera = CameraLog::default();
        let source = MemorySource {
            map: scene_map(),
            scenes: scenes(),
            sceneries: sceneries(),
            counters: Rc::clone(&counters),
            yield_on_fetch,
        };
        let host = Host {
            graph: Box::new(tree.clone()),
            music: Box::new(AmbienceMusic(Rc::clone(&music))),
            menu_music: Box::new(MenuMusic(Rc::clone(&music))),
            camera: Box::new(RecordingCamera(Rc::clone(&camera))),
            animator: Box::new(NullAnimator),
        };
        let manager = block_on(SceneManager::new(Box::new(source), host, config)).expect("manager");
        Self {
            manager,
            session: GameSession::default(),
            tree: tree.0,
            counters,
            music,
            camera,
        }
    }

    fn goto(&self, index: u32) -> Result<GotoOutcome, LoadError> {
        block_on(self.manager.goto(&self.session, SceneIndex(index), false))
    }

    fn force(&self, index: u32) -> Result<GotoOutcome, LoadError> {
        block_on(self.manager.goto(&self.session, SceneIndex(index), true))
    }

    fn tick(&mut self) -> TickReport {
        self.manager.tick(&mut self.session)
    }

    fn scene_fetches(&self) -> usize {
        self.counters.scene_data.get()
    }

    fn protagonist_alive(&self, index: u32) -> Option<bool> {
        self.manager
            .with_scene(SceneIndex(index), |scene| {
                scene.actors().get(PROTAGONIST).map(Actor::is_alive)
            })
            .flatten()
    }
}

#[test]
fn goto_makes_requested_scene_current() {
    let harness = Harness::new();

    for index in [0, 1, 3, 4, 5] {
        let outcome = harness.goto(index).expect("goto");
        assert_ne!(outcome, GotoOutcome::Ignored);
        assert_eq!(harness.manager.active_index(), Some(SceneIndex(index)));
        assert_eq!(
            harness.manager.with_active_scene(Scene::is_active),
            Some(true)
        );
    }
}

#[test]
fn goto_current_scene_is_ignored_unless_forced() {
    let harness = Harness::new();
    harness.goto(0).expect("first");

    assert_eq!(harness.goto(0).expect("again"), GotoOutcome::Ignored);
    assert_eq!(harness.scene_fetches(), 1);

    assert_eq!(
        harness.force(0).expect("forced"),
        GotoOutcome::Loaded(SceneIndex(0))
    );
    assert_eq!(harness.scene_fetches(), 2);
    assert_eq!(harness.manager.with_arena(SceneArena::len), 1);
}

#[test]
fn next_and_previous_wrap_at_the_ends_of_the_map() {
    let harness = Harness::new();
    let session = &harness.session;
    let manager = &harness.manager;

    assert_eq!(
        block_on(manager.next(session)).expect("nothing loaded"),
        GotoOutcome::Ignored
    );

    harness.goto(0).expect("start");
    block_on(manager.previous(session)).expect("wrap back");
    assert_eq!(manager.active_index(), Some(SceneIndex(LAST_SCENE)));
    block_on(manager.next(session)).expect("wrap forward");
    assert_eq!(manager.active_index(), Some(SceneIndex(0)));

    block_on(manager.next(session)).expect("next");
    assert_eq!(manager.active_index(), Some(SceneIndex(1)));
    block_on(manager.previous(session)).expect("previous");
    assert_eq!(manager.active_index(), Some(SceneIndex(0)));
}

#[test]
fn cube_bank_is_sized_by_highest_reference_and_zeroed_on_load() {
    let mut harness = Harness::new();

    harness.goto(0).expect("scene 0");
    assert_eq!(
        harness
            .manager
            .with_active_scene(|scene| scene.cube_vars().len()),
        Some(0)
    );

    harness.goto(1).expect("scene 1");
    harness.tick();
    assert_eq!(
        harness
            .manager
            .with_active_scene(|scene| scene.cube_vars().values().to_vec()),
        Some(vec![0, 0, 0, 0, 9])
    );

    harness.force(1).expect("reload");
    assert_eq!(
        harness
            .manager
            .with_active_scene(|scene| scene.cube_vars().values().to_vec()),
        Some(vec![0; 5])
    );
}

#[test]
fn revived_actor_restarts_its_script_from_the_entry_point() {
    let mut harness = Harness::new();
    harness.goto(3).expect("scene 3");

    let mut guard_ips = Vec::new();
    for tick in 0..4 {
        if tick == 2 {
            harness.session.game_vars.write(REVIVE_VAR, 1);
        }
        let mut trace = Vec::new();
        let report = harness
            .manager
            .tick_with_trace(&mut harness.session, Some(&mut trace));
        guard_ips.extend(
            trace
                .iter()
                .filter(|step| step.actor == ActorIndex(1) && step.kind == ScriptKind::Life)
                .map(|step| step.ip),
        );
        if tick == 2 {
            assert_eq!(
                report.events,
                vec![
                    ScriptEvent::ActorKilled {
                        actor: ActorIndex(1),
                        by: ActorIndex(2),
                    },
                    ScriptEvent::ActorRevived {
                        actor: ActorIndex(1),
                        by: ActorIndex(2),
                    },
                ]
            );
        }
    }

    assert_eq!(guard_ips, vec![0, 1, 2, 0]);
}

#[test]
fn side_scene_swap_moves_protagonist_without_loading() {
    let harness = Harness::new();
    harness.goto(3).expect("main");
    let fetches = harness.scene_fetches();
    let actors = harness.counters.actors.get();
    assert_eq!(harness.protagonist_alive(4), Some(false));

    assert_eq!(
        harness.goto(4).expect("swap"),
        GotoOutcome::Swapped(SceneIndex(4))
    );

    assert_eq!(harness.manager.active_index(), Some(SceneIndex(4)));
    assert_eq!(harness.protagonist_alive(3), Some(false));
    assert_eq!(harness.protagonist_alive(4), Some(true));
    assert_eq!(
        harness
            .manager
            .with_active_scene(|scene| scene.side_scene_indices()),
        Some(vec![SceneIndex(3)])
    );
    assert_eq!(
        harness
            .manager
            .with_scene(SceneIndex(3), |scene| scene.is_active()),
        Some(false)
    );
    assert_eq!(harness.scene_fetches(), fetches);
    assert_eq!(harness.counters.actors.get(), actors);

    let hidden = harness
        .manager
        .with_scene(SceneIndex(3), |scene| {
            scene.actors().get(PROTAGONIST).and_then(Actor::node)
        })
        .flatten()
        .expect("main protagonist node");
    assert!(!harness.tree.borrow().node(hidden).expect("node").visible);

    assert_eq!(
        harness.goto(3).expect("swap back"),
        GotoOutcome::Swapped(SceneIndex(3))
    );
    assert_eq!(harness.protagonist_alive(3), Some(true));
    assert_eq!(harness.protagonist_alive(4), Some(false));
}

#[test]
fn island_family_loads_together_and_side_goto_swaps() {
    let harness = Harness::new();

    assert_eq!(
        harness.goto(3).expect("load"),
        GotoOutcome::Loaded(SceneIndex(3))
    );
    assert_eq!(
        harness
            .manager
            .with_active_scene(|scene| scene.side_scene_indices()),
        Some(vec![SceneIndex(4)])
    );
    assert_eq!(harness.scene_fetches(), 2);
    assert_eq!(*harness.counters.sceneries.borrow(), vec!["island_X"]);
    assert_eq!(harness.manager.with_arena(SceneArena::scenery_count), 1);

    let side_offset = harness
        .manager
        .with_scene(SceneIndex(4), Scene::node)
        .and_then(|node| harness.tree.borrow().node(node).map(|node| node.position));
    assert_eq!(side_offset, Some(Vec3::new(64.0, 0.0, 0.0)));

    assert_eq!(
        harness.goto(4).expect("swap"),
        GotoOutcome::Swapped(SceneIndex(4))
    );
    assert_eq!(harness.scene_fetches(), 2);
    assert_eq!(harness.manager.active_index(), Some(SceneIndex(4)));
}

#[test]
fn goto_issued_while_loading_is_dropped() {
    let harness = Harness::build(SceneConfig::default(), true);
    harness.goto(0).expect("start");
    let manager = &harness.manager;
    let session = &harness.session;

    let (first, second) = block_on(async {
        futures::join!(
            manager.goto(session, SceneIndex(1), false),
            manager.goto(session, SceneIndex(3), false)
        )
    });

    assert_eq!(first.expect("first"), GotoOutcome::Loaded(SceneIndex(1)));
    assert_eq!(second.expect("second"), GotoOutcome::Ignored);
    assert_eq!(manager.active_index(), Some(SceneIndex(1)));
    assert_eq!(harness.scene_fetches(), 2);
    assert!(!manager.is_loading());
}

#[test]
fn ticks_are_skipped_while_a_transition_is_loading() {
    let harness = Harness::build(SceneConfig::default(), true);
    harness.goto(1).expect("start");
    let mut idle = GameSession::default();

    block_on(async {
        let mut pending = pin!(harness.manager.goto(&harness.session, SceneIndex(0), false));
        assert!(futures::poll!(pending.as_mut()).is_pending());
        assert!(harness.manager.is_loading());
        assert_eq!(harness.manager.tick(&mut idle), TickReport::default());
        assert!(!harness.manager.reset_active());
        pending.await.expect("load");
    });

    assert!(!harness.manager.is_loading());
    assert_eq!(harness.manager.active_index(), Some(SceneIndex(0)));
}

#[test]
fn forced_goto_and_side_swap_are_dropped_while_loading() {
    let harness = Harness::build(SceneConfig::default(), true);
    harness.goto(3).expect("main scene");
    let manager = &harness.manager;
    let session = &harness.session;

    let (load, forced, next) = block_on(async {
        futures::join!(
            manager.goto(session, SceneIndex(0), false),
            manager.goto(session, SceneIndex(4), true),
            manager.next(session)
        )
    });

    assert_eq!(load.expect("load"), GotoOutcome::Loaded(SceneIndex(0)));
    assert_eq!(forced.expect("forced"), GotoOutcome::Ignored);
    assert_eq!(next.expect("next"), GotoOutcome::Ignored);
    assert_eq!(manager.active_index(), Some(SceneIndex(0)));
}

#[test]
fn abandoned_transition_hands_activity_back() {
    let harness = Harness::build(SceneConfig::default(), true);
    harness.goto(0).expect("start");

    let mut pending = Box::pin(harness.manager.goto(&harness.session, SceneIndex(1), false));
    assert!(block_on(async { futures::poll!(pending.as_mut()) }).is_pending());
    assert_eq!(
        harness.manager.with_active_scene(Scene::is_active),
        Some(false)
    );
    drop(pending);

    assert!(!harness.manager.is_loading());
    assert_eq!(
        harness.manager.with_active_scene(Scene::is_active),
        Some(true)
    );
}

#[test]
fn loading_flag_clears_even_if_state_is_borrowed_on_drop() {
    let harness = Harness::build(SceneConfig::default(), true);
    harness.goto(0).expect("start");

    let mut pending = Box::pin(harness.manager.goto(&harness.session, SceneIndex(1), false));
    assert!(block_on(async { futures::poll!(pending.as_mut()) }).is_pending());
    harness.manager.with_arena(|_| drop(pending));

    assert!(!harness.manager.is_loading());
    assert_eq!(
        harness.manager.with_active_scene(Scene::is_active),
        Some(false)
    );
    assert_eq!(
        harness.force(0).expect("reload"),
        GotoOutcome::Loaded(SceneIndex(0))
    );
}

#[test]
fn failed_load_keeps_previous_scene_active() {
    let harness = Harness::new();
    harness.goto(0).expect("start");
    let root = harness.tree.borrow().active_root();

    let err = harness.goto(FAILING_SCENE).expect_err("scenery is missing");

    assert!(matches!(err, LoadError::Unavailable { .. }));
    assert!(!harness.manager.is_loading());
    assert_eq!(harness.manager.active_index(), Some(SceneIndex(0)));
    assert_eq!(
        harness.manager.with_active_scene(Scene::is_active),
        Some(true)
    );
    assert_eq!(harness.manager.with_arena(SceneArena::len), 1);
    assert_eq!(harness.tree.borrow().active_root(), root);

    harness.goto(1).expect("recovers");
    assert_eq!(harness.manager.active_index(), Some(SceneIndex(1)));
}

fn assert_previous_scene_untouched(harness: &Harness, root: Option<NodeId>, nodes: usize) {
    assert!(!harness.manager.is_loading());
    assert_eq!(harness.manager.active_index(), Some(SceneIndex(0)));
    assert_eq!(
        harness.manager.with_active_scene(Scene::is_active),
        Some(true)
    );
    assert_eq!(harness.manager.with_arena(SceneArena::len), 1);
    assert_eq!(harness.tree.borrow().active_root(), root);
    assert_eq!(harness.tree.borrow().node_count(), nodes);
}

#[test]
fn malformed_actor_script_fails_the_transition() {
    let harness = Harness::new();
    harness.goto(0).expect("start");
    let root = harness.tree.borrow().active_root();
    let nodes = harness.tree.borrow().node_count();

    let err = harness
        .goto(MALFORMED_ACTOR_SCENE)
        .expect_err("jump target is out of range");

    match err {
        LoadError::Script {
            scene, actor, name, ..
        } => {
            assert_eq!(scene, SceneIndex(MALFORMED_ACTOR_SCENE));
            assert_eq!(actor, 1);
            assert_eq!(name, "lost");
        }
        other => panic!("expected a script error, got {other:?}"),
    }
    assert_previous_scene_untouched(&harness, root, nodes);

    harness.goto(1).expect("recovers");
    assert_eq!(harness.manager.active_index(), Some(SceneIndex(1)));
}

#[test]
fn side_scene_with_missing_section_fails_the_whole_family() {
    let harness = Harness::new();
    harness.goto(0).expect("start");
    let root = harness.tree.borrow().active_root();
    let nodes = harness.tree.borrow().node_count();

    let err = harness
        .goto(MISSING_SECTION_SCENE)
        .expect_err("side scene section is out of range");

    match err {
        LoadError::MissingSection {
            scene,
            scenery,
            section,
            available,
        } => {
            assert_eq!(scene, SceneIndex(BROKEN_SIDE_SCENE));
            assert_eq!(scenery, "Y");
            assert_eq!(section, 3);
            assert_eq!(available, 1);
        }
        other => panic!("expected a missing section, got {other:?}"),
    }
    assert_previous_scene_untouched(&harness, root, nodes);
}

#[test]
fn unknown_scene_index_is_an_error() {
    let harness = Harness::new();

    let err = harness.goto(42).expect_err("unknown");

    assert!(matches!(err, LoadError::UnknownScene(SceneIndex(42))));
    assert_eq!(harness.scene_fetches(), 0);
    assert!(!harness.manager.is_loading());
}

#[test]
fn ambience_music_starts_only_when_nothing_is_playing() {
    let harness = Harness::new();

    harness.goto(0).expect("scene 0");
    assert_eq!(*harness.music.loaded.borrow(), vec![1]);
    assert_eq!(harness.music.menu_stops.get(), 1);

    harness.goto(1).expect("scene 1");
    assert_eq!(*harness.music.loaded.borrow(), vec![1]);

    harness.music.playing.set(false);
    harness.goto(3).expect("scene 3");
    assert_eq!(*harness.music.loaded.borrow(), vec![1, 5]);
    assert_eq!(harness.music.menu_stops.get(), 2);
}

#[test]
fn camera_is_reinitialized_on_the_protagonist() {
    let harness = Harness::new();

    harness.goto(0).expect("scene 0");

    assert_eq!(
        *harness.camera.borrow(),
        vec![(SceneIndex(0), Some(Vec3::new(1.0, 0.0, 1.0)))]
    );
}

#[test]
fn leaving_a_family_tears_down_its_nodes_and_scenery() {
    let harness = Harness::new();
    harness.goto(3).expect("island");
    assert_eq!(harness.manager.with_arena(SceneArena::len), 2);

    harness.goto(0).expect("iso");

    assert_eq!(harness.manager.with_arena(SceneArena::len), 1);
    assert_eq!(harness.manager.with_arena(SceneArena::scenery_count), 1);
    let tree = harness.tree.borrow();
    assert!(tree.find_by_name("island_root").is_none());
    assert!(tree.find_by_name("scenery_X").is_none());
    let iso_root = tree.find_by_name("iso_root").expect("iso root");
    assert_eq!(tree.active_root(), Some(iso_root));
    assert_eq!(tree.scenery_props().get("name"), Some(&json!("iso_0")));
}

#[test]
fn unload_clears_the_view() {
    let harness = Harness::new();
    harness.goto(3).expect("island");

    assert!(harness.manager.unload());

    assert_eq!(harness.manager.active_index(), None);
    assert!(harness.manager.with_arena(SceneArena::is_empty));
    assert_eq!(harness.tree.borrow().node_count(), 0);
    assert!(!harness.manager.unload());
}

#[test]
fn island_override_selects_replacement_scenery() {
    let mut plain = Harness::new();
    plain.goto(5).expect("plain");
    assert_eq!(
        plain.manager.with_active_scene(|scene| scene.island().map(str::to_string)),
        Some(Some("CITADEL".to_string()))
    );

    plain.session.game_vars.write(OVERRIDE_VAR, 1);
    plain.force(5).expect("overridden");

    assert_eq!(
        plain.counters.sceneries.borrow().last().map(String::as_str),
        Some("island_CITADEL_RUINS")
    );
    assert_eq!(
        plain.manager.with_active_scene(Scene::env),
        Some(EnvInfo {
            sky_color: [10, 20, 30],
            fog_density: 0.5,
        })
    );
}

#[test]
fn editor_markers_add_zone_and_point_nodes() {
    let plain = Harness::new();
    plain.goto(3).expect("plain");
    assert!(plain.tree.borrow().find_by_name("zone_0_gate").is_none());

    let config = SceneConfig {
        editor_markers: true,
        ..SceneConfig::default()
    };
    let marked = Harness::build(config, false);
    marked.goto(3).expect("marked");
    let tree = marked.tree.borrow();
    assert!(tree.find_by_name("zone_0_gate").is_some());
    let door = tree.find_by_name("point_0_door").expect("point marker");
    assert_eq!(tree.world_position(door), Some(Vec3::new(3.0, 0.0, 4.0)));
}

#[test]
fn reset_active_restores_variables_and_actors() {
    let mut harness = Harness::new();
    harness.goto(1).expect("scene 1");
    harness.tick();

    assert!(harness.manager.reset_active());

    assert_eq!(
        harness
            .manager
            .with_active_scene(|scene| scene.cube_vars().values().to_vec()),
        Some(vec![0; 5])
    );
    assert_eq!(harness.camera.borrow().len(), 2);
    let report = harness.tick();
    assert_eq!(report.commands_executed, 2);
}

#[test]
fn entering_a_change_scene_zone_requests_a_transition() {
    let mut harness = Harness::new();
    harness.goto(3).expect("scene 3");
    harness.session.game_vars.write(WALK_VAR, 1);

    let walked = harness.tick();
    assert!(walked.events.is_empty());
    let arrived = harness.tick();

    assert_eq!(arrived.scene, Some(SceneIndex(3)));
    assert_eq!(
        arrived.events,
        vec![ScriptEvent::SceneChangeRequested {
            index: SceneIndex(0),
            by: PROTAGONIST,
        }]
    );
    assert!(harness.tick().events.is_empty());
}
