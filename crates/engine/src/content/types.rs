use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::Vec3;
use crate::scripting::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneIndex(pub u32);

impl fmt::Display for SceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambience {
    pub music_track: u16,
    #[serde(default)]
    pub sky_color: Option<[u8; 3]>,
    #[serde(default)]
    pub fog_density: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub sky_color: [u8; 3],
    pub fog_density: f32,
}

impl Default for EnvInfo {
    fn default() -> Self {
        Self {
            sky_color: [0, 0, 0],
            fog_density: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorData {
    pub name: String,
    /// Model key; actors without one are invisible triggers and get no node.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub behaviour: u8,
    #[serde(default)]
    pub anim: u16,
    #[serde(default)]
    pub life: Vec<Command>,
    #[serde(default, rename = "move")]
    pub moves: Vec<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneKind {
    ChangeScene { target: SceneIndex },
    Camera,
    Sceneric,
    Text,
    Ladder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    pub name: String,
    pub kind: ZoneKind,
    pub min: Vec3,
    pub max: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointData {
    pub name: String,
    pub position: Vec3,
}

/// One scene as served by the scene data source for a given language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    pub ambience: Ambience,
    #[serde(default)]
    pub actors: Vec<ActorData>,
    #[serde(default)]
    pub zones: Vec<ZoneData>,
    #[serde(default)]
    pub points: Vec<PointData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorVisual {
    pub model: String,
    pub env: EnvInfo,
}

/// An actor after its asset fetch; `visual` is `None` for trigger-only actors.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorAsset {
    pub data: ActorData,
    pub visual: Option<ActorVisual>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub x: f32,
    pub z: f32,
}

impl Section {
    /// Sections are stored in half units.
    pub fn offset(&self) -> Vec3 {
        Vec3::new(self.x * 2.0, 0.0, self.z * 2.0)
    }
}

/// Static level geometry description. Island sceneries are shared by a main
/// scene and all of its side scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenery {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub props: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneryRequest<'a> {
    Island {
        island: &'a str,
        ambience: &'a Ambience,
    },
    Isometric {
        iso_index: u32,
    },
}
