use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::scripting::ScriptError;

use super::scene_map::{SceneMap, SceneMapError};
use super::types::{
    ActorAsset, ActorData, ActorVisual, Ambience, EnvInfo, SceneData, SceneIndex, Scenery,
    SceneryRequest,
};

pub const SCENE_MAP_FILE: &str = "scene_map.xml";

/// Failures that abort the transition in progress.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse '{path}' at {json_path}: {source}")]
    Json {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("scene map: {0}")]
    SceneMap(#[from] SceneMapError),
    #[error("scene {0} is not in the scene map")]
    UnknownScene(SceneIndex),
    #[error("scene {scene} sits on section {section} but scenery '{scenery}' has {available} sections")]
    MissingSection {
        scene: SceneIndex,
        scenery: String,
        section: usize,
        available: usize,
    },
    #[error("scene {scene} actor {actor} ('{name}') has an invalid script: {source}")]
    Script {
        scene: SceneIndex,
        actor: usize,
        name: String,
        #[source]
        source: ScriptError,
    },
    #[error("{what} is unavailable: {reason}")]
    Unavailable { what: String, reason: String },
}

/// Read-only provider of scene content. Every fetch is a suspension point of a
/// scene transition.
#[async_trait(?Send)]
pub trait ContentSource {
    async fn load_scene_map(&self) -> Result<SceneMap, LoadError>;

    async fn load_scene_data(
        &self,
        language: &str,
        index: SceneIndex,
    ) -> Result<SceneData, LoadError>;

    async fn load_actor(
        &self,
        env: EnvInfo,
        ambience: &Ambience,
        data: ActorData,
    ) -> Result<ActorAsset, LoadError>;

    async fn load_scenery(&self, request: SceneryRequest<'_>) -> Result<Scenery, LoadError>;
}

/// Content laid out on disk under one base directory:
/// `scene_map.xml`, `scenes/<language>/scene_<index>.json` and
/// `sceneries/{island_<name>,iso_<index>}.json`.
#[derive(Debug, Clone)]
pub struct FileContentSource {
    root: PathBuf,
}

impl FileContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scene_data_path(&self, language: &str, index: SceneIndex) -> PathBuf {
        self.root
            .join("scenes")
            .join(language)
            .join(format!("scene_{:03}.json", index.0))
    }

    pub fn scenery_path(&self, request: SceneryRequest<'_>) -> PathBuf {
        let file_name = match request {
            SceneryRequest::Island { island, .. } => {
                format!("island_{}.json", island.to_ascii_lowercase())
            }
            SceneryRequest::Isometric { iso_index } => format!("iso_{iso_index:03}.json"),
        };
        self.root.join("sceneries").join(file_name)
    }
}

#[async_trait(?Send)]
impl ContentSource for FileContentSource {
    async fn load_scene_map(&self) -> Result<SceneMap, LoadError> {
        let path = self.root.join(SCENE_MAP_FILE);
        let raw = read_text(&path)?;
        Ok(SceneMap::parse(&path, &raw)?)
    }

    async fn load_scene_data(
        &self,
        language: &str,
        index: SceneIndex,
    ) -> Result<SceneData, LoadError> {
        let path = self.scene_data_path(language, index);
        debug!(scene = %index, language, path = %path.display(), "scene_data_read");
        read_json(&path)
    }

    async fn load_actor(
        &self,
        env: EnvInfo,
        _ambience: &Ambience,
        data: ActorData,
    ) -> Result<ActorAsset, LoadError> {
        let visual = data
            .model
            .clone()
            .map(|model| ActorVisual { model, env });
        Ok(ActorAsset { data, visual })
    }

    async fn load_scenery(&self, request: SceneryRequest<'_>) -> Result<Scenery, LoadError> {
        let path = self.scenery_path(request);
        debug!(path = %path.display(), "scenery_read");
        read_json(&path)
    }
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let raw = read_text(path)?;
    parse_json(path, &raw)
}

fn parse_json<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, LoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|error| {
        let json_path = error.path().to_string();
        LoadError::Json {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}
