use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use futures::executor::block_on;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::{FileContentSource, LoadError, SceneIndex};
use crate::scene::{GotoOutcome, SceneConfig, SceneManager};
use crate::scripting::{ScriptEvent, DEFAULT_STEP_BUDGET};
use crate::session::{load_session_save, GameSession, SessionError};
use crate::{resolve_app_paths, AppPaths, StartupError};

use super::metrics::MetricsAccumulator;
use super::{Host, MetricsHandle};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub language: String,
    /// Scene to open. `None` resumes the saved scene, or scene 0 without a
    /// save.
    pub start_scene: Option<SceneIndex>,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    /// Stop after this many ticks; `None` runs until the process is killed.
    pub max_ticks: Option<u64>,
    pub metrics_log_interval: Duration,
    pub step_budget: usize,
    pub editor_markers: bool,
    /// Session save, relative to the cache directory.
    pub save_file_name: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            start_scene: None,
            target_tps: 20,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            max_ticks: None,
            metrics_log_interval: Duration::from_secs(1),
            step_budget: DEFAULT_STEP_BUDGET,
            editor_markers: false,
            save_file_name: "session.json".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load scene content: {0}")]
    Load(#[from] LoadError),
    #[error("failed to persist session: {0}")]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub scene_changes: u32,
    pub final_scene: Option<SceneIndex>,
}

pub fn run_app(config: LoopConfig, host: Host) -> Result<RunSummary, AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, host, metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    host: Host,
    metrics_handle: MetricsHandle,
) -> Result<RunSummary, AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        cache_dir = %app_paths.cache_dir.display(),
        "startup"
    );
    run_with_paths(config, &app_paths, host, metrics_handle)
}

/// Drives the scene manager at a fixed tick rate against the content under
/// `app_paths`. The session is saved after every scene change and on exit.
pub fn run_with_paths(
    config: LoopConfig,
    app_paths: &AppPaths,
    host: Host,
    metrics_handle: MetricsHandle,
) -> Result<RunSummary, AppError> {
    let save_path = app_paths.cache_dir.join(&config.save_file_name);
    let mut session = GameSession::default();
    let saved_scene = restore_session(&save_path, &mut session);
    let start_scene = resolve_start_scene(config.start_scene, saved_scene);

    let scene_config = SceneConfig {
        language: config.language.clone(),
        editor_markers: config.editor_markers,
        step_budget: config.step_budget.max(1),
    };
    let source = FileContentSource::new(&app_paths.base_content_dir);
    let manager = block_on(SceneManager::new(Box::new(source), host, scene_config))?;
    block_on(manager.goto(&session, start_scene, false))?;

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        max_ticks = ?config.max_ticks,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        step_budget = manager.config().step_budget,
        "loop_config"
    );

    let mut summary = RunSummary {
        ticks: 0,
        scene_changes: 0,
        final_scene: None,
    };
    // Start with one tick's worth so the first frame runs immediately.
    let mut accumulator = fixed_dt;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    'frames: loop {
        let now = Instant::now();
        let frame_dt = clamp_frame_delta(
            now.saturating_duration_since(last_frame_instant),
            max_frame_delta,
        );
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(frame_dt);

        let plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        accumulator = plan.remaining_accumulator;
        if !plan.dropped_backlog.is_zero() {
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                "sim_backlog_dropped"
            );
        }

        for _ in 0..plan.ticks_to_run {
            let tick_start = Instant::now();
            let report = manager.tick(&mut session);
            metrics_accumulator.record_tick(tick_start.elapsed(), report.commands_executed);
            summary.ticks = summary.ticks.saturating_add(1);

            if let Some(target) = requested_scene(&report.events) {
                if follow_scene_change(&manager, &session, target, &save_path) {
                    summary.scene_changes = summary.scene_changes.saturating_add(1);
                }
            }

            if config.max_ticks.is_some_and(|max| summary.ticks >= max) {
                break 'frames;
            }
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                commands_per_tick = snapshot.commands_per_tick,
                scene = ?manager.active_index(),
                "loop_metrics"
            );
        }

        thread::sleep(fixed_dt.saturating_sub(accumulator));
    }

    summary.final_scene = manager.active_index();
    session.save_to_path(
        &save_path,
        summary.final_scene,
        &manager.active_used_game_vars(),
    )?;
    info!(
        ticks = summary.ticks,
        scene_changes = summary.scene_changes,
        final_scene = ?summary.final_scene,
        "shutdown"
    );
    Ok(summary)
}

/// Restores game variables from a previous run; a missing save starts fresh
/// and an unreadable one is reported and ignored.
fn restore_session(path: &Path, session: &mut GameSession) -> Option<SceneIndex> {
    if !path.is_file() {
        return None;
    }
    match load_session_save(path) {
        Ok(save) => {
            let scene = session.restore(&save);
            info!(
                path = %path.display(),
                game_vars = save.game_vars.len(),
                scene = ?scene,
                "session_restored"
            );
            scene
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "session_restore_failed");
            None
        }
    }
}

/// An explicitly configured start scene wins over the one in the save.
fn resolve_start_scene(
    configured: Option<SceneIndex>,
    saved: Option<SceneIndex>,
) -> SceneIndex {
    match (configured, saved) {
        (Some(configured), Some(saved)) => {
            if configured != saved {
                info!(configured = %configured, saved = %saved, "start_scene_overrides_save");
            }
            configured
        }
        (Some(configured), None) => configured,
        (None, Some(saved)) => saved,
        (None, None) => SceneIndex(0),
    }
}

/// Moves to `target` and checkpoints the session when the scene actually
/// changed. Returns whether it did.
fn follow_scene_change(
    manager: &SceneManager,
    session: &GameSession,
    target: SceneIndex,
    save_path: &Path,
) -> bool {
    match block_on(manager.goto(session, target, false)) {
        Ok(GotoOutcome::Ignored) => false,
        Ok(_) => {
            let scene = manager.active_index();
            match session.save_to_path(save_path, scene, &manager.active_used_game_vars()) {
                Ok(()) => debug!(scene = ?scene, path = %save_path.display(), "session_checkpoint"),
                Err(error) => {
                    warn!(path = %save_path.display(), error = %error, "session_checkpoint_failed")
                }
            }
            true
        }
        Err(error) => {
            warn!(scene = %target, error = %error, "scene_change_failed");
            false
        }
    }
}

/// First scene change asked for during a tick; later requests in the same tick
/// would be dropped by the loading guard anyway.
fn requested_scene(events: &[ScriptEvent]) -> Option<SceneIndex> {
    events.iter().find_map(|event| match event {
        ScriptEvent::SceneChangeRequested { index, .. } => Some(*index),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
