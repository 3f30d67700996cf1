mod actor;
mod arena;
mod assembler;
mod manager;
mod zone;

#[cfg(test)]
mod tests;

pub use actor::{Actor, ActorIndex, ActorRegistry, PROTAGONIST};
pub use arena::{Scene, SceneArena, SceneId, SceneLink, SceneryId};
pub use assembler::SceneConfig;
pub use manager::{GotoOutcome, SceneManager, TickReport};
pub use zone::{Point, PointRegistry, Zone, ZoneRegistry, ZoneRunState};
