use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::content::{write_text_atomic, SceneIndex};
use crate::scripting::GameVariables;

pub const SESSION_SAVE_VERSION: u32 = 1;

/// Process-lifetime game state owned by the top-level runtime and passed
/// explicitly to the scene manager and the interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameSession {
    pub game_vars: GameVariables,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSave {
    pub save_version: u32,
    pub scene: Option<SceneIndex>,
    /// Sparse bank: only indices ever touched or referenced by the active scene.
    pub game_vars: BTreeMap<u16, i32>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("read session '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write session '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode session: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse session at {json_path}: {source}")]
    Parse {
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported session save_version: expected {expected}, got {actual}")]
    Version { expected: u32, actual: u32 },
}

impl GameSession {
    /// Game variables worth persisting: every index ever read or written plus
    /// `referenced` (the active scene's used game variables).
    pub fn snapshot(&self, scene: Option<SceneIndex>, referenced: &[u16]) -> SessionSave {
        let indices = self
            .game_vars
            .touched()
            .chain(referenced.iter().copied())
            .collect::<BTreeSet<_>>();
        let game_vars = indices
            .into_iter()
            .map(|index| (index, self.game_vars.get(index).unwrap_or(0)))
            .collect();
        SessionSave {
            save_version: SESSION_SAVE_VERSION,
            scene,
            game_vars,
        }
    }

    /// Writes the saved values into the bank; the returned scene is where the
    /// session left off.
    pub fn restore(&mut self, save: &SessionSave) -> Option<SceneIndex> {
        for (index, value) in &save.game_vars {
            self.game_vars.write(*index, *value);
        }
        save.scene
    }

    pub fn save_to_path(
        &self,
        path: &Path,
        scene: Option<SceneIndex>,
        referenced: &[u16],
    ) -> Result<(), SessionError> {
        let save = self.snapshot(scene, referenced);
        let json = serde_json::to_string_pretty(&save).map_err(SessionError::Encode)?;
        write_text_atomic(path, &json).map_err(|source| SessionError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            game_vars = save.game_vars.len(),
            "session_saved"
        );
        Ok(())
    }
}

pub fn load_session_save(path: &Path) -> Result<SessionSave, SessionError> {
    let raw = fs::read_to_string(path).map_err(|source| SessionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_session_save(&raw)
}

fn parse_session_save(raw: &str) -> Result<SessionSave, SessionError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let save: SessionSave = serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        SessionError::Parse {
            json_path: error.path().to_string(),
            source: error.into_inner(),
        }
    })?;
    if save.save_version != SESSION_SAVE_VERSION {
        return Err(SessionError::Version {
            expected: SESSION_SAVE_VERSION,
            actual: save.save_version,
        });
    }
    Ok(save)
}
