//! Per-track playout pipeline: decode, calibrate, schedule

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::calibrator::ClockCalibrator;
use super::metrics::{MetricsSnapshot, TrackMetrics};
use super::output::OutputSink;
use super::playout::{SchedulerHandle, spawn_scheduler};
use super::scheduler::SchedulerStats;
use crate::clock::SharedClock;
use crate::error::{PlaytimeError, Result, Staleness};
use crate::protocol::ExtensionError;
use crate::types::{CachedObject, GroupId, ObjectId, PlaytimeConfig, TimingPolicy, TrackName};

/// Summary returned when a track finishes
#[derive(Debug, Clone, Serialize)]
pub struct PlayoutReport {
    /// Track played
    pub track: TrackName,
    /// Final counters
    pub metrics: MetricsSnapshot,
    /// Final scheduler counters
    pub scheduler: SchedulerStats,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    group_id: GroupId,
    object_id: ObjectId,
    deadline_ns: i64,
}

/// Consumer pipeline for one Track
///
/// Owns a [`ClockCalibrator`] and a spawned scheduler. Objects are fed
/// either one at a time through [`TrackPlayout::accept`] or from a channel
/// with [`TrackPlayout::run`].
#[derive(Debug)]
pub struct TrackPlayout {
    track: TrackName,
    policy: TimingPolicy,
    clock: SharedClock,
    calibrator: ClockCalibrator,
    scheduler: SchedulerHandle<CachedObject>,
    task: JoinHandle<Result<SchedulerStats>>,
    metrics: Arc<TrackMetrics>,
    anchor: Option<Anchor>,
    diverged: bool,
}

impl TrackPlayout {
    /// Start the scheduler task for `track`
    pub fn new<S>(
        track: impl Into<TrackName>,
        policy: TimingPolicy,
        config: &PlaytimeConfig,
        clock: SharedClock,
        sink: S,
    ) -> Self
    where
        S: OutputSink<CachedObject>,
    {
        let metrics = Arc::new(TrackMetrics::new());
        let (scheduler, task) = spawn_scheduler(
            config.scheduler(),
            Arc::clone(&clock),
            sink,
            Arc::clone(&metrics),
        );

        Self {
            track: track.into(),
            policy,
            clock,
            calibrator: ClockCalibrator::new(config.calibrator()),
            scheduler,
            task,
            metrics,
            anchor: None,
            diverged: false,
        }
    }

    /// Track being played
    #[must_use]
    pub fn track(&self) -> &TrackName {
        &self.track
    }

    /// Shared counters
    #[must_use]
    pub fn metrics(&self) -> Arc<TrackMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle to the scheduler, e.g. to stop playback from elsewhere
    #[must_use]
    pub fn scheduler(&self) -> SchedulerHandle<CachedObject> {
        self.scheduler.clone()
    }

    /// Process one arriving Object.
    ///
    /// Staleness rejections and unanchored Objects are counted and return
    /// `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::ProtocolViolation`] for a bad or (in
    /// per-object mode) missing TARGET_PLAYTIME, and
    /// [`PlaytimeError::SchedulerClosed`] once the scheduler stopped.
    pub async fn accept(&mut self, object: CachedObject) -> Result<()> {
        self.metrics.record_received();
        let arrival_ns = self.clock.now_ns();

        let stamped = object
            .target_playtime()
            .map_err(|source| self.violation(source))?;

        let deadline_ns = match stamped {
            Some(target) => match self.calibrate(&object, target, arrival_ns).await {
                Some(deadline) => deadline,
                None => return Ok(()),
            },
            None => match self.derive_from_anchor(&object)? {
                Some(deadline) => deadline,
                None => return Ok(()),
            },
        };

        self.scheduler.enqueue(object, deadline_ns).await
    }

    /// Consume `objects` until the channel closes, then drain
    ///
    /// # Errors
    ///
    /// Returns the first fatal error after stopping the scheduler.
    pub async fn run(mut self, mut objects: mpsc::Receiver<CachedObject>) -> Result<PlayoutReport> {
        tracing::info!(track = %self.track, policy = ?self.policy, "Track playout started");

        while let Some(object) = objects.recv().await {
            match self.accept(object).await {
                Ok(()) => {}
                Err(PlaytimeError::SchedulerClosed) => {
                    tracing::info!(track = %self.track, "Scheduler closed, ending playout");
                    break;
                }
                Err(e) => {
                    tracing::warn!(track = %self.track, "Closing track: {e}");
                    self.scheduler.stop();
                    // The track error takes precedence over the scheduler's result.
                    let _ = self.finish().await;
                    return Err(e);
                }
            }
        }

        self.scheduler.end_of_track().await;
        self.finish().await
    }

    /// Wait for the scheduler to close and collect the final counters
    ///
    /// # Errors
    ///
    /// Propagates an output sink failure.
    pub async fn finish(self) -> Result<PlayoutReport> {
        self.scheduler.closed().await;
        let scheduler = self
            .task
            .await
            .map_err(|e| PlaytimeError::Transport {
                message: format!("scheduler task failed: {e}"),
            })??;

        let metrics = self.metrics.snapshot();
        tracing::info!(
            track = %self.track,
            released = metrics.released,
            late_dropped = metrics.late_dropped,
            rejected = metrics.rejected_stale(),
            "Track playout finished"
        );
        Ok(PlayoutReport {
            track: self.track,
            metrics,
            scheduler,
        })
    }

    async fn calibrate(&mut self, object: &CachedObject, target: i64, arrival_ns: i64) -> Option<i64> {
        let calibration = match self.calibrator.observe(target, arrival_ns) {
            Ok(c) => c,
            Err(e) => {
                match e {
                    PlaytimeError::StalenessRejected {
                        direction: Staleness::Past,
                        ..
                    } => self.metrics.record_rejected_past(),
                    PlaytimeError::StalenessRejected {
                        direction: Staleness::Future,
                        ..
                    } => self.metrics.record_rejected_future(),
                    _ => {}
                }
                tracing::warn!(object = %object.key(), "Rejecting object: {e}");
                return None;
            }
        };

        if calibration.outlier {
            self.metrics.record_outlier();
        }
        self.metrics.set_drift_ns(calibration.drift_ns);

        // The estimate is kept: deadlines stay corrected by the measured drift.
        match calibration.divergence {
            Some(divergence) if !self.diverged => {
                self.diverged = true;
                self.metrics.record_divergence();
                let err = PlaytimeError::from(divergence);
                tracing::warn!(track = %self.track, "{err}; rebuffering");
                self.scheduler.rebuffer().await;
            }
            Some(_) => {}
            None => {
                if self.diverged {
                    tracing::info!(
                        track = %self.track,
                        drift_ns = calibration.drift_ns,
                        "Clock drift back within bound"
                    );
                }
                self.diverged = false;
            }
        }

        self.anchor = Some(Anchor {
            group_id: object.group_id,
            object_id: object.object_id,
            deadline_ns: calibration.deadline_ns,
        });
        Some(calibration.deadline_ns)
    }

    fn derive_from_anchor(&self, object: &CachedObject) -> Result<Option<i64>> {
        if self.policy.stamps_every_object() {
            return Err(self.violation(ExtensionError::Missing));
        }

        match self.anchor {
            Some(anchor)
                if anchor.group_id == object.group_id && object.object_id >= anchor.object_id =>
            {
                let offset = self
                    .policy
                    .derive_offset_ns(anchor.object_id, object.object_id);
                Ok(Some(anchor.deadline_ns.saturating_add(offset)))
            }
            _ => {
                self.metrics.record_unanchored();
                let err = PlaytimeError::Unanchored {
                    group_id: object.group_id,
                };
                tracing::warn!(object = %object.key(), "Dropping object: {err}");
                Ok(None)
            }
        }
    }

    fn violation(&self, source: ExtensionError) -> PlaytimeError {
        PlaytimeError::ProtocolViolation {
            track: self.track.clone(),
            source,
        }
    }
}
