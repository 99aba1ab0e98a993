//! Playback scheduler state machine
//!
//! A synchronous core that owns the release queue for one Track. It never
//! reads a clock itself: every call takes `now_ns`, which keeps it usable
//! from the async driver in [`super::playout`] and trivially testable.
//!
//! ```text
//! Idle -> Buffering -> Playing -> Draining -> Closed
//!             ^           |
//!             +- rebuffer +
//! ```

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlaytimeError, Result};
use crate::types::PlaytimeConfig;

/// What happens to queued Objects when the Track ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Release pending Objects at their deadlines, then close
    #[default]
    HonorDeadlines,
    /// Discard pending Objects and close immediately
    DropPending,
}

/// Scheduler settings, see [`PlaytimeConfig::scheduler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Margin accumulated before leaving Buffering
    pub jitter_buffer_target_ns: i64,
    /// Lateness beyond which an Object is dropped
    pub lateness_drop_threshold_ns: i64,
    /// End-of-track behaviour
    pub drain_policy: DrainPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        PlaytimeConfig::default().scheduler()
    }
}

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Nothing received yet
    Idle,
    /// Accumulating the jitter margin
    Buffering,
    /// Releasing Objects at their deadlines
    Playing,
    /// End of track seen; releasing what is left
    Draining,
    /// Terminal
    Closed,
}

impl SchedulerState {
    /// Whether new Objects are still accepted
    #[must_use]
    pub fn accepts_objects(self) -> bool {
        matches!(self, Self::Idle | Self::Buffering | Self::Playing)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of [`PlaybackScheduler::poll`]
#[derive(Debug, PartialEq, Eq)]
pub enum Poll<T> {
    /// Present this item now
    Release {
        /// The item
        item: T,
        /// Its deadline
        deadline_ns: i64,
    },
    /// The front item was too late and has been discarded
    Dropped {
        /// Its deadline
        deadline_ns: i64,
        /// How late it was
        lateness_ns: i64,
    },
    /// Nothing to do before this instant
    WaitUntil(i64),
    /// Nothing queued
    Pending,
    /// The scheduler is closed
    Closed,
}

/// Scheduler counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Items accepted by `enqueue`
    pub enqueued: u64,
    /// Items released
    pub released: u64,
    /// Items dropped for lateness
    pub late_dropped: u64,
    /// Items discarded unplayed by stop or drop-pending drain
    pub discarded: u64,
    /// Playing -> Buffering transitions
    pub rebuffers: u64,
}

#[derive(Debug)]
struct Entry<T> {
    item: T,
    deadline_ns: i64,
}

/// Per-track release queue
#[derive(Debug)]
pub struct PlaybackScheduler<T> {
    config: SchedulerConfig,
    state: SchedulerState,
    queue: VecDeque<Entry<T>>,
    buffering_since_ns: Option<i64>,
    stats: SchedulerStats,
}

impl<T> PlaybackScheduler<T> {
    /// Create an idle scheduler
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            queue: VecDeque::new(),
            buffering_since_ns: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Number of queued items
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Deadline of the next item to be released
    #[must_use]
    pub fn front_deadline(&self) -> Option<i64> {
        self.queue.front().map(|e| e.deadline_ns)
    }

    /// Deadline span currently buffered
    #[must_use]
    pub fn buffered_span_ns(&self) -> i64 {
        match (self.queue.front(), self.queue.back()) {
            (Some(front), Some(back)) => back.deadline_ns.saturating_sub(front.deadline_ns).max(0),
            _ => 0,
        }
    }

    /// Queue an item for release at `deadline_ns`
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::SchedulerClosed`] once draining has started.
    pub fn enqueue(&mut self, item: T, deadline_ns: i64, now_ns: i64) -> Result<()> {
        if !self.state.accepts_objects() {
            return Err(PlaytimeError::SchedulerClosed);
        }

        self.queue.push_back(Entry { item, deadline_ns });
        self.stats.enqueued += 1;

        if self.state == SchedulerState::Idle {
            self.buffering_since_ns = Some(now_ns);
            self.transition(SchedulerState::Buffering);
        }
        self.check_buffered(now_ns);
        Ok(())
    }

    /// Advance the state machine and return the next action
    pub fn poll(&mut self, now_ns: i64) -> Poll<T> {
        match self.state {
            SchedulerState::Idle => Poll::Pending,
            SchedulerState::Closed => Poll::Closed,
            SchedulerState::Buffering => {
                self.check_buffered(now_ns);
                if self.state == SchedulerState::Buffering {
                    return self.buffering_wake().map_or(Poll::Pending, Poll::WaitUntil);
                }
                self.release_front(now_ns)
            }
            SchedulerState::Playing | SchedulerState::Draining => self.release_front(now_ns),
        }
    }

    /// Signal that no more Objects will arrive
    pub fn end_of_track(&mut self, now_ns: i64) {
        match self.state {
            SchedulerState::Closed | SchedulerState::Draining => return,
            SchedulerState::Idle => {
                self.transition(SchedulerState::Closed);
                return;
            }
            SchedulerState::Buffering | SchedulerState::Playing => {}
        }

        self.transition(SchedulerState::Draining);
        if self.config.drain_policy == DrainPolicy::DropPending {
            self.discard_pending();
        }
        tracing::debug!(now_ns, pending = self.queue.len(), "Scheduler draining");
        if self.queue.is_empty() {
            self.transition(SchedulerState::Closed);
        }
    }

    /// Close immediately, discarding anything pending
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Closed {
            return;
        }
        self.discard_pending();
        self.transition(SchedulerState::Closed);
    }

    /// Go back to Buffering from Playing. Returns false in any other state.
    pub fn rebuffer(&mut self, now_ns: i64) -> bool {
        if self.state != SchedulerState::Playing {
            return false;
        }
        self.buffering_since_ns = Some(now_ns);
        self.stats.rebuffers += 1;
        self.transition(SchedulerState::Buffering);
        true
    }

    fn release_front(&mut self, now_ns: i64) -> Poll<T> {
        let Some(front) = self.queue.front() else {
            if self.state == SchedulerState::Draining {
                self.transition(SchedulerState::Closed);
                return Poll::Closed;
            }
            return Poll::Pending;
        };

        let deadline_ns = front.deadline_ns;
        if now_ns < deadline_ns {
            return Poll::WaitUntil(deadline_ns);
        }

        let lateness_ns = now_ns.saturating_sub(deadline_ns);
        let Some(entry) = self.queue.pop_front() else {
            return Poll::Pending;
        };
        if lateness_ns > self.config.lateness_drop_threshold_ns {
            self.stats.late_dropped += 1;
            return Poll::Dropped {
                deadline_ns,
                lateness_ns,
            };
        }

        self.stats.released += 1;
        Poll::Release {
            item: entry.item,
            deadline_ns,
        }
    }

    fn check_buffered(&mut self, now_ns: i64) {
        if self.state != SchedulerState::Buffering {
            return;
        }
        let Some(front_deadline) = self.front_deadline() else {
            return;
        };

        let target = self.config.jitter_buffer_target_ns;
        let waited = self
            .buffering_since_ns
            .map_or(0, |since| now_ns.saturating_sub(since));
        if self.buffered_span_ns() >= target || waited >= target || now_ns >= front_deadline {
            tracing::debug!(
                buffered_ns = self.buffered_span_ns(),
                waited_ns = waited,
                pending = self.queue.len(),
                "Scheduler: starting playback"
            );
            self.buffering_since_ns = None;
            self.transition(SchedulerState::Playing);
        }
    }

    fn buffering_wake(&self) -> Option<i64> {
        let front = self.front_deadline()?;
        let timeout = self
            .buffering_since_ns
            .map(|since| since.saturating_add(self.config.jitter_buffer_target_ns));
        Some(timeout.map_or(front, |t| t.min(front)))
    }

    fn discard_pending(&mut self) {
        let dropped = self.queue.len() as u64;
        if dropped > 0 {
            tracing::debug!(dropped, "Scheduler discarding pending items");
        }
        self.stats.discarded += dropped;
        self.queue.clear();
    }

    fn transition(&mut self, to: SchedulerState) {
        if self.state != to {
            tracing::info!(from = %self.state, to = %to, "Scheduler state change");
            self.state = to;
        }
    }
}
