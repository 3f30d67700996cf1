mod host;
mod loop_runner;
mod metrics;
mod spatial;

pub use host::{ActorAnimator, CameraController, Host, MusicPlayer};
pub use loop_runner::{
    run_app, run_app_with_metrics, run_with_paths, AppError, LoopConfig, RunSummary,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use spatial::{NodeId, NodeTree, SpatialGraph, SpatialNode, Vec3};
