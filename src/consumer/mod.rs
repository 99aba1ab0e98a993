//! Consumer side: turning TARGET_PLAYTIME into presentation events
//!
//! - [`calibrator`]: drift estimation and plausibility checks
//! - [`scheduler`]: the synchronous release queue state machine
//! - [`playout`]: the tokio task that drives a scheduler against real time
//! - [`track`]: per-track pipeline gluing the above together
//! - [`output`]: where released Objects go
//! - [`metrics`]: counters for external observability

pub mod calibrator;
pub mod metrics;
pub mod output;
pub mod playout;
pub mod scheduler;
pub mod track;

#[cfg(test)]
mod tests;

pub use calibrator::{Calibration, CalibratorConfig, CalibratorStats, ClockCalibrator, Divergence};
pub use metrics::{MetricsSnapshot, TrackMetrics};
pub use output::{ChannelSink, NullSink, OutputSink, Presented};
pub use playout::{SchedulerHandle, SchedulerStatus, spawn_scheduler};
pub use scheduler::{
    DrainPolicy, PlaybackScheduler, Poll, SchedulerConfig, SchedulerState, SchedulerStats,
};
pub use track::{PlayoutReport, TrackPlayout};
