//! Async driver for [`PlaybackScheduler`]
//!
//! The scheduler core lives inside one tokio task. The task's only wait is a
//! deadline sleep, raced against the command channel and the stop signal so
//! new Objects, end-of-track and stop all take effect immediately.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::metrics::TrackMetrics;
use super::output::{OutputSink, Presented};
use super::scheduler::{PlaybackScheduler, Poll, SchedulerConfig, SchedulerState, SchedulerStats};
use crate::clock::{SharedClock, duration_until};
use crate::error::{PlaytimeError, Result};

const COMMAND_QUEUE_DEPTH: usize = 64;

/// State and counters published by the driver after every step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Current state
    pub state: SchedulerState,
    /// Counters
    pub stats: SchedulerStats,
    /// Items waiting for release
    pub pending: usize,
}

enum Command<T> {
    Enqueue {
        item: T,
        deadline_ns: i64,
        reply: oneshot::Sender<Result<()>>,
    },
    EndOfTrack,
    Rebuffer {
        reply: oneshot::Sender<bool>,
    },
}

/// Control handle for a spawned scheduler
pub struct SchedulerHandle<T> {
    commands: mpsc::Sender<Command<T>>,
    stop: Arc<watch::Sender<bool>>,
    status: watch::Receiver<SchedulerStatus>,
}

impl<T> Clone for SchedulerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            stop: Arc::clone(&self.stop),
            status: self.status.clone(),
        }
    }
}

impl<T> std::fmt::Debug for SchedulerHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> SchedulerHandle<T> {
    /// Queue an item for release at `deadline_ns`
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::SchedulerClosed`] once the scheduler is
    /// draining, closed or gone.
    pub async fn enqueue(&self, item: T, deadline_ns: i64) -> Result<()> {
        if !self.state().accepts_objects() {
            return Err(PlaytimeError::SchedulerClosed);
        }
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Enqueue {
                item,
                deadline_ns,
                reply,
            })
            .await
            .map_err(|_| PlaytimeError::SchedulerClosed)?;
        rx.await.map_err(|_| PlaytimeError::SchedulerClosed)?
    }

    /// No more items will be enqueued
    pub async fn end_of_track(&self) {
        // A closed channel means the driver has already finished.
        let _ = self.commands.send(Command::EndOfTrack).await;
    }

    /// Return to Buffering if currently Playing
    pub async fn rebuffer(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Rebuffer { reply }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Close now, discarding anything pending. Preempts a deadline wait.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Latest published status
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        *self.status.borrow()
    }

    /// Latest published state
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.status.borrow().state
    }

    /// Latest published counters
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.status.borrow().stats
    }

    /// Wait until the scheduler reaches Closed
    pub async fn closed(&self) {
        let mut status = self.status.clone();
        // Err means the driver task is gone, which also means closed.
        let _ = status
            .wait_for(|s| s.state == SchedulerState::Closed)
            .await;
    }
}

/// Run a scheduler in its own task
///
/// Released items go to `sink`. The join handle resolves to the final
/// counters, or to the sink's error if presenting failed.
pub fn spawn_scheduler<T, S>(
    config: SchedulerConfig,
    clock: SharedClock,
    sink: S,
    metrics: Arc<TrackMetrics>,
) -> (SchedulerHandle<T>, JoinHandle<Result<SchedulerStats>>)
where
    T: Send + 'static,
    S: OutputSink<T>,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (stop_tx, stop_rx) = watch::channel(false);
    let (status_tx, status_rx) = watch::channel(SchedulerStatus {
        state: SchedulerState::Idle,
        stats: SchedulerStats::default(),
        pending: 0,
    });

    let driver = Driver {
        threshold_ns: config.lateness_drop_threshold_ns,
        core: PlaybackScheduler::new(config),
        clock,
        sink,
        metrics,
        status: status_tx,
        reported_discarded: 0,
    };
    let task = tokio::spawn(driver.run(command_rx, stop_rx));

    let handle = SchedulerHandle {
        commands: command_tx,
        stop: Arc::new(stop_tx),
        status: status_rx,
    };
    (handle, task)
}

struct Driver<T, S> {
    core: PlaybackScheduler<T>,
    threshold_ns: i64,
    clock: SharedClock,
    sink: S,
    metrics: Arc<TrackMetrics>,
    status: watch::Sender<SchedulerStatus>,
    reported_discarded: u64,
}

impl<T, S> Driver<T, S>
where
    T: Send + 'static,
    S: OutputSink<T>,
{
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command<T>>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<SchedulerStats> {
        tracing::info!("Playout scheduler started");
        let result = self.drive(&mut commands, &mut stop).await;
        if let Err(ref e) = result {
            tracing::warn!("Playout scheduler failed: {e}");
            self.core.stop();
        }
        self.publish();
        tracing::info!(stats = ?self.core.stats(), "Playout scheduler finished");
        result.map(|()| self.core.stats())
    }

    async fn drive(
        &mut self,
        commands: &mut mpsc::Receiver<Command<T>>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut commands_open = true;
        let mut stop_open = true;

        loop {
            if *stop.borrow() {
                self.core.stop();
            }

            let Some(wake) = self.release_due().await? else {
                return Ok(());
            };
            self.publish();

            let sleep_for = wake.map(|at| duration_until(&*self.clock, at));

            tokio::select! {
                biased;

                changed = stop.changed(), if stop_open => {
                    if changed.is_err() {
                        stop_open = false;
                    }
                }

                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => {
                        commands_open = false;
                        self.core.end_of_track(self.clock.now_ns());
                    }
                },

                () = tokio::time::sleep(sleep_for.unwrap_or_default()), if sleep_for.is_some() => {}

                else => self.core.stop(),
            }
        }
    }

    /// Release or drop everything due now.
    ///
    /// Returns `None` once closed, otherwise the next wake-up instant
    /// (`Some(None)` if there is nothing to wait for).
    async fn release_due(&mut self) -> Result<Option<Option<i64>>> {
        loop {
            let now = self.clock.now_ns();
            match self.core.poll(now) {
                Poll::Release { item, deadline_ns } => {
                    self.metrics.record_released();
                    tracing::debug!(deadline_ns, lateness_ns = now - deadline_ns, "Releasing");
                    self.sink
                        .present(Presented {
                            item,
                            deadline_ns,
                            released_at_ns: now,
                        })
                        .await?;
                }
                Poll::Dropped {
                    deadline_ns,
                    lateness_ns,
                } => {
                    self.metrics.record_late_drop();
                    let err = PlaytimeError::LateDrop {
                        lateness_ns,
                        threshold_ns: self.threshold_ns,
                    };
                    tracing::warn!(deadline_ns, "Dropping object: {err}");
                }
                Poll::WaitUntil(at) => return Ok(Some(Some(at))),
                Poll::Pending => return Ok(Some(None)),
                Poll::Closed => return Ok(None),
            }
        }
    }

    fn handle(&mut self, cmd: Command<T>) {
        match cmd {
            Command::Enqueue {
                item,
                deadline_ns,
                reply,
            } => {
                let result = self.core.enqueue(item, deadline_ns, self.clock.now_ns());
                let _ = reply.send(result);
            }
            Command::EndOfTrack => self.core.end_of_track(self.clock.now_ns()),
            Command::Rebuffer { reply } => {
                let rebuffered = self.core.rebuffer(self.clock.now_ns());
                if rebuffered {
                    self.metrics.record_rebuffer();
                }
                let _ = reply.send(rebuffered);
            }
        }
    }

    fn publish(&mut self) {
        let stats = self.core.stats();
        if stats.discarded > self.reported_discarded {
            self.metrics
                .record_discarded(stats.discarded - self.reported_discarded);
            self.reported_discarded = stats.discarded;
        }
        self.status.send_replace(SchedulerStatus {
            state: self.core.state(),
            stats,
            pending: self.core.len(),
        });
    }
}
