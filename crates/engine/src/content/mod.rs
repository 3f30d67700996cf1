mod atomic_io;
mod scene_map;
mod source;
mod types;

pub(crate) use atomic_io::write_text_atomic;
pub use scene_map::{
    IslandOverride, IslandSlot, SceneKind, SceneMap, SceneMapEntry, SceneMapError,
    SceneMapErrorCode, SourceLocation,
};
pub use source::{ContentSource, FileContentSource, LoadError, SCENE_MAP_FILE};
pub use types::{
    ActorAsset, ActorData, ActorVisual, Ambience, EnvInfo, PointData, SceneData, SceneIndex,
    Scenery, SceneryRequest, Section, ZoneData, ZoneKind,
};
