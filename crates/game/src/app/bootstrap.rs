use std::env;

use isle_engine::{Host, LoopConfig, SceneIndex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::host::headless_host;

const LANGUAGE_ENV_VAR: &str = "ISLE_LANGUAGE";
const START_SCENE_ENV_VAR: &str = "ISLE_START_SCENE";
const MAX_TICKS_ENV_VAR: &str = "ISLE_MAX_TICKS";
const EDITOR_MARKERS_ENV_VAR: &str = "ISLE_EDITOR_MARKERS";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) host: Host,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Isle Startup ===");

    let config = config_from_env(|var| env::var(var).ok());
    info!(
        language = %config.language,
        start_scene = ?config.start_scene,
        max_ticks = ?config.max_ticks,
        editor_markers = config.editor_markers,
        "config_resolved"
    );

    AppWiring {
        config,
        host: headless_host(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn config_from_env(lookup: impl Fn(&str) -> Option<String>) -> LoopConfig {
    let defaults = LoopConfig::default();
    let language = lookup(LANGUAGE_ENV_VAR)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or(defaults.language.clone());
    let start_scene = match lookup(START_SCENE_ENV_VAR) {
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(index) => Some(SceneIndex(index)),
            Err(error) => {
                warn!(var = START_SCENE_ENV_VAR, value = %raw, error = %error, "invalid_env_value");
                defaults.start_scene
            }
        },
        None => defaults.start_scene,
    };
    let max_ticks = lookup(MAX_TICKS_ENV_VAR).and_then(|raw| {
        match raw.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(ticks) => Some(ticks),
            Err(error) => {
                warn!(var = MAX_TICKS_ENV_VAR, value = %raw, error = %error, "invalid_env_value");
                defaults.max_ticks
            }
        }
    });
    let editor_markers = match lookup(EDITOR_MARKERS_ENV_VAR) {
        Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
            warn!(var = EDITOR_MARKERS_ENV_VAR, value = %raw, "invalid_env_value");
            defaults.editor_markers
        }),
        None => defaults.editor_markers,
    };

    LoopConfig {
        language,
        start_scene,
        max_ticks,
        editor_markers,
        ..defaults
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
