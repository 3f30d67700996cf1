//! Scene construction in two phases. The async load phase fetches and
//! validates everything a family needs (scene data, actors in parallel,
//! scenery, side scenes) without touching shared state; the attach phase then
//! builds nodes and fills the arena synchronously and cannot fail.

use std::collections::BTreeMap;

use futures::future::{try_join_all, FutureExt, LocalBoxFuture};
use tracing::{debug, info};

use crate::app::{NodeId, SpatialGraph, Vec3};
use crate::content::{
    ActorAsset, ContentSource, EnvInfo, LoadError, PointData, SceneData, SceneIndex, SceneKind,
    SceneMap, Scenery, SceneryRequest, ZoneData,
};
use crate::scripting::{
    cube_variable_len, referenced_game_variables, Command, GameVariables, SceneVariables,
    ScriptProgram, DEFAULT_STEP_BUDGET,
};

use super::actor::{Actor, ActorIndex, ActorRegistry, PROTAGONIST};
use super::arena::{Scene, SceneArena, SceneId, SceneLink, SceneryId};
use super::zone::{Point, PointRegistry, Zone, ZoneRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneConfig {
    pub language: String,
    /// Gives zones and points marker nodes.
    pub editor_markers: bool,
    pub step_budget: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            editor_markers: false,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

pub(super) struct LoadRequest<'a> {
    pub(super) source: &'a dyn ContentSource,
    pub(super) map: &'a SceneMap,
    pub(super) config: &'a SceneConfig,
    pub(super) game_vars: &'a GameVariables,
}

struct LoadedActor {
    asset: ActorAsset,
    life: ScriptProgram,
    moves: ScriptProgram,
}

/// A fully fetched scene family member, ready to attach.
pub(super) struct LoadedScene {
    index: SceneIndex,
    kind: SceneKind,
    island: Option<String>,
    env: EnvInfo,
    data: SceneData,
    actors: Vec<LoadedActor>,
    /// Present on the scene that owns the family's scenery.
    scenery: Option<Scenery>,
    offset: Vec3,
    cube_len: usize,
    used_game_vars: Vec<u16>,
    side_scenes: Vec<LoadedScene>,
}

impl LoadedScene {
    pub(super) fn family_len(&self) -> usize {
        1 + self.side_scenes.len()
    }
}

/// Loads scene `index` and, for an island main scene, every side scene that
/// shares its island and variant. Side scenes reuse `parent`'s scenery.
pub(super) fn load_scene<'a>(
    req: &'a LoadRequest<'a>,
    index: SceneIndex,
    parent: Option<&'a Scenery>,
) -> LocalBoxFuture<'a, Result<LoadedScene, LoadError>> {
    async move {
        let entry = req.map.entry(index).ok_or(LoadError::UnknownScene(index))?;
        let data = req
            .source
            .load_scene_data(&req.config.language, index)
            .await?;

        let island = match &entry.kind {
            SceneKind::Island(slot) => Some(req.map.resolve_island_name(&slot.island, req.game_vars)),
            SceneKind::Isometric { .. } => None,
        };
        let env = match island.as_deref() {
            Some(name) => {
                let base = req.map.env_for(Some(name));
                EnvInfo {
                    sky_color: data.ambience.sky_color.unwrap_or(base.sky_color),
                    fog_density: data.ambience.fog_density.unwrap_or(base.fog_density),
                }
            }
            None => EnvInfo::default(),
        };

        let assets = try_join_all(
            data.actors
                .iter()
                .cloned()
                .map(|actor| req.source.load_actor(env, &data.ambience, actor)),
        )
        .await?;
        let actors = compile_actors(index, assets)?;

        let scenery = match (parent, &entry.kind, island.as_deref()) {
            (Some(_), _, _) => None,
            (None, SceneKind::Island(_), Some(name)) => Some(
                req.source
                    .load_scenery(SceneryRequest::Island {
                        island: name,
                        ambience: &data.ambience,
                    })
                    .await?,
            ),
            (None, SceneKind::Isometric { iso_index }, _) => Some(
                req.source
                    .load_scenery(SceneryRequest::Isometric {
                        iso_index: *iso_index,
                    })
                    .await?,
            ),
            (None, SceneKind::Island(_), None) => None,
        };

        let offset = match &entry.kind {
            SceneKind::Island(slot) => {
                let family_scenery = parent.or(scenery.as_ref());
                let sections = family_scenery.map(|scenery| scenery.sections.as_slice());
                match sections.and_then(|sections| sections.get(slot.section)) {
                    Some(section) => section.offset(),
                    None => {
                        return Err(LoadError::MissingSection {
                            scene: index,
                            scenery: family_scenery
                                .map(|scenery| scenery.name.clone())
                                .unwrap_or_default(),
                            section: slot.section,
                            available: sections.map_or(0, <[_]>::len),
                        })
                    }
                }
            }
            SceneKind::Isometric { .. } => Vec3::ZERO,
        };

        let programs = actors
            .iter()
            .flat_map(|actor| [&actor.life, &actor.moves])
            .collect::<Vec<_>>();
        let cube_len = cube_variable_len(programs.iter().copied());
        let used_game_vars = referenced_game_variables(programs.iter().copied());

        let side_scenes = match (&scenery, parent, entry.kind.is_island()) {
            (Some(family_scenery), None, true) => {
                let side_indices = req.map.side_scene_indices(index);
                try_join_all(
                    side_indices
                        .into_iter()
                        .map(|side| load_scene(req, side, Some(family_scenery))),
                )
                .await?
            }
            _ => Vec::new(),
        };

        debug!(
            scene = %index,
            actors = actors.len(),
            zones = data.zones.len(),
            points = data.points.len(),
            cube_vars = cube_len,
            side_scenes = side_scenes.len(),
            "scene_fetched"
        );

        Ok(LoadedScene {
            index,
            kind: entry.kind.clone(),
            island,
            env,
            data,
            actors,
            scenery,
            offset,
            cube_len,
            used_game_vars,
            side_scenes,
        })
    }
    .boxed_local()
}

fn compile_actors(
    scene: SceneIndex,
    assets: Vec<ActorAsset>,
) -> Result<Vec<LoadedActor>, LoadError> {
    assets
        .into_iter()
        .enumerate()
        .map(|(actor, asset)| {
            let compile = |commands: &[Command]| {
                ScriptProgram::compile(commands.to_vec()).map_err(|source| LoadError::Script {
                    scene,
                    actor,
                    name: asset.data.name.clone(),
                    source,
                })
            };
            let life = compile(&asset.data.life)?;
            let moves = compile(&asset.data.moves)?;
            Ok(LoadedActor { asset, life, moves })
        })
        .collect()
}

/// Builds the family's nodes under a fresh root and moves the loaded scenes
/// into the arena. Returns the main scene's id.
pub(super) fn attach_family(
    loaded: LoadedScene,
    arena: &mut SceneArena,
    graph: &mut dyn SpatialGraph,
    config: &SceneConfig,
) -> SceneId {
    let root_name = if loaded.kind.is_island() {
        "island_root"
    } else {
        "iso_root"
    };
    // The root goes in first; every scene node of the family hangs off it.
    let root = graph.create_node(root_name);
    if let Some(scenery) = &loaded.scenery {
        let scenery_node = graph.create_node(&format!("scenery_{}", scenery.name));
        graph.add_child(root, scenery_node);
    }
    attach_scene(loaded, None, root, None, arena, graph, config)
}

fn attach_scene(
    mut loaded: LoadedScene,
    parent: Option<SceneId>,
    root: NodeId,
    family_scenery: Option<SceneryId>,
    arena: &mut SceneArena,
    graph: &mut dyn SpatialGraph,
    config: &SceneConfig,
) -> SceneId {
    let id = arena.allocate_scene_id();
    let scenery = match (loaded.scenery.take(), family_scenery) {
        (Some(owned), _) => arena.insert_scenery(owned),
        (None, Some(shared)) => shared,
        (None, None) => arena.insert_scenery(Scenery {
            name: format!("empty_{}", loaded.index),
            sections: Vec::new(),
            props: Default::default(),
        }),
    };

    let node = graph.create_node(&format!("scene_{}", loaded.index));
    graph.add_child(root, node);
    graph.set_position(node, loaded.offset);

    let actors = loaded
        .actors
        .into_iter()
        .enumerate()
        .map(|(position, actor)| {
            let index = ActorIndex(position);
            let actor_node = actor.asset.visual.as_ref().map(|visual| {
                let actor_node = graph.create_node(&format!("actor_{position}_{}", visual.model));
                graph.add_child(node, actor_node);
                graph.set_position(actor_node, actor.asset.data.position);
                actor_node
            });
            Actor::with_programs(index, &actor.asset.data, actor_node, actor.life, actor.moves)
        })
        .collect();
    let zones = zone_registry(&loaded.data.zones, node, graph, config);
    let points = point_registry(&loaded.data.points, node, graph, config);

    let side_scenes = loaded.side_scenes;
    let link = match (parent, loaded.kind.is_island()) {
        (Some(parent), _) => SceneLink::Side { parent },
        (None, true) => SceneLink::Main {
            side_scenes: Default::default(),
        },
        (None, false) => SceneLink::Standalone,
    };

    arena.insert_scene(Scene {
        id,
        index: loaded.index,
        kind: loaded.kind,
        island: loaded.island,
        ambience: loaded.data.ambience,
        env: loaded.env,
        scenery,
        family_root: root,
        node,
        actors: ActorRegistry::from_actors(actors),
        zones,
        points,
        cube_vars: SceneVariables::with_len(loaded.cube_len),
        cube_len: loaded.cube_len,
        used_game_vars: loaded.used_game_vars,
        link,
        active: false,
    });

    let mut attached_sides = BTreeMap::new();
    for side in side_scenes {
        let side_index = side.index;
        let side_id = attach_scene(side, Some(id), root, Some(scenery), arena, graph, config);
        // Only the active scene's protagonist is awake.
        if let Some(protagonist) = arena
            .get_mut(side_id)
            .and_then(|scene| scene.actors.get_mut(PROTAGONIST))
        {
            protagonist.kill(graph);
        }
        attached_sides.insert(side_index, side_id);
    }
    if let Some(SceneLink::Main { side_scenes }) =
        arena.get_mut(id).map(|scene| &mut scene.link)
    {
        *side_scenes = attached_sides;
    }

    info!(
        scene = %loaded.index,
        node = node.0,
        side_scenes = ?arena.get(id).map(Scene::side_scene_indices).unwrap_or_default(),
        "scene_attached"
    );
    id
}

fn zone_registry(
    zones: &[ZoneData],
    scene_node: NodeId,
    graph: &mut dyn SpatialGraph,
    config: &SceneConfig,
) -> ZoneRegistry {
    let zones = zones
        .iter()
        .enumerate()
        .map(|(index, data)| {
            let marker = config.editor_markers.then(|| {
                let marker = graph.create_node(&format!("zone_{index}_{}", data.name));
                graph.add_child(scene_node, marker);
                graph.set_position(marker, data.min);
                marker
            });
            Zone::from_data(index, data, marker)
        })
        .collect();
    ZoneRegistry::from_zones(zones)
}

fn point_registry(
    points: &[PointData],
    scene_node: NodeId,
    graph: &mut dyn SpatialGraph,
    config: &SceneConfig,
) -> PointRegistry {
    let points = points
        .iter()
        .enumerate()
        .map(|(index, data)| {
            let marker = config.editor_markers.then(|| {
                let marker = graph.create_node(&format!("point_{index}_{}", data.name));
                graph.add_child(scene_node, marker);
                graph.set_position(marker, data.position);
                marker
            });
            Point::from_data(index, data, marker)
        })
        .collect();
    PointRegistry::from_points(points)
}
