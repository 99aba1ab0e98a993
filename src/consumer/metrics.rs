//! Per-track counters exposed to an external observability collaborator

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters, shared between the playout task and readers
#[derive(Debug, Default)]
pub struct TrackMetrics {
    received: AtomicU64,
    rejected_past: AtomicU64,
    rejected_future: AtomicU64,
    unanchored: AtomicU64,
    outliers: AtomicU64,
    divergences: AtomicU64,
    rebuffers: AtomicU64,
    released: AtomicU64,
    late_dropped: AtomicU64,
    discarded: AtomicU64,
    drift_ns: AtomicI64,
}

/// Point-in-time copy of [`TrackMetrics`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Objects handed to the playout pipeline
    pub received: u64,
    /// Rejected as stale (too far behind)
    pub rejected_past: u64,
    /// Rejected as implausibly far ahead
    pub rejected_future: u64,
    /// Group-anchor Objects dropped for lack of an anchor
    pub unanchored: u64,
    /// Samples excluded from the drift filter
    pub outliers: u64,
    /// Times the drift estimate crossed the sanity bound
    pub divergences: u64,
    /// Scheduler rebuffers
    pub rebuffers: u64,
    /// Objects presented
    pub released: u64,
    /// Objects dropped for lateness
    pub late_dropped: u64,
    /// Objects discarded unplayed at stop
    pub discarded: u64,
    /// Latest drift estimate
    pub drift_ns: i64,
}

impl MetricsSnapshot {
    /// Objects rejected by the staleness check in either direction
    #[must_use]
    pub fn rejected_stale(&self) -> u64 {
        self.rejected_past + self.rejected_future
    }

    /// Serialize as JSON
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        $(
            #[doc = concat!("Increment `", stringify!($field), "`")]
            pub fn $record(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl TrackMetrics {
    /// Fresh zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        record_received => received,
        record_rejected_past => rejected_past,
        record_rejected_future => rejected_future,
        record_unanchored => unanchored,
        record_outlier => outliers,
        record_divergence => divergences,
        record_rebuffer => rebuffers,
        record_released => released,
        record_late_drop => late_dropped,
    }

    /// Add `count` discarded Objects
    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Publish the latest drift estimate
    pub fn set_drift_ns(&self, drift_ns: i64) {
        self.drift_ns.store(drift_ns, Ordering::Relaxed);
    }

    /// Latest drift estimate
    #[must_use]
    pub fn drift_ns(&self) -> i64 {
        self.drift_ns.load(Ordering::Relaxed)
    }

    /// Copy every counter
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected_past: self.rejected_past.load(Ordering::Relaxed),
            rejected_future: self.rejected_future.load(Ordering::Relaxed),
            unanchored: self.unanchored.load(Ordering::Relaxed),
            outliers: self.outliers.load(Ordering::Relaxed),
            divergences: self.divergences.load(Ordering::Relaxed),
            rebuffers: self.rebuffers.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            late_dropped: self.late_dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            drift_ns: self.drift_ns.load(Ordering::Relaxed),
        }
    }
}
