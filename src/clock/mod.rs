//! Injected sources of "now"
//!
//! Every component that needs wall-clock time takes a [`ClockSource`]
//! rather than reading the system clock, so tests can drive time
//! deterministically.
//!
//! - [`SystemClock`]: the real wall clock
//! - [`AnchoredClock`]: wall-clock anchored once, then advanced by the tokio
//!   timer; under a paused tokio runtime it only moves when tokio time does
//! - [`ManualClock`]: set and advanced explicitly

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Capability supplying the current time in nanoseconds since the Unix epoch
pub trait ClockSource: Send + Sync + fmt::Debug {
    /// Current time in nanoseconds since the Unix epoch
    fn now_ns(&self) -> i64;
}

/// Clock shared between pipeline stages
pub type SharedClock = Arc<dyn ClockSource>;

impl<T: ClockSource + ?Sized> ClockSource for Arc<T> {
    fn now_ns(&self) -> i64 {
        (**self).now_ns()
    }
}

/// Time remaining until `deadline_ns`, zero if it has passed
#[must_use]
pub fn duration_until(clock: &dyn ClockSource, deadline_ns: i64) -> Duration {
    let remaining = deadline_ns.saturating_sub(clock.now_ns());
    Duration::from_nanos(u64::try_from(remaining).unwrap_or(0))
}

/// The operating system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ns(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_nanos()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_nanos())
                .map_or(i64::MIN, |ns| -ns),
        }
    }
}

/// Wall clock read once at construction and advanced by tokio's timer
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    anchor_ns: i64,
    anchor: tokio::time::Instant,
}

impl AnchoredClock {
    /// Anchor `anchor_ns` to the current tokio instant
    #[must_use]
    pub fn new(anchor_ns: i64) -> Self {
        Self {
            anchor_ns,
            anchor: tokio::time::Instant::now(),
        }
    }

    /// Anchor to the system wall clock
    #[must_use]
    pub fn from_system() -> Self {
        Self::new(SystemClock.now_ns())
    }
}

impl ClockSource for AnchoredClock {
    fn now_ns(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_nanos()).unwrap_or(i64::MAX);
        self.anchor_ns.saturating_add(elapsed)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock reading `now_ns`
    #[must_use]
    pub fn new(now_ns: i64) -> Self {
        Self {
            now_ns: Arc::new(AtomicI64::new(now_ns)),
        }
    }

    /// Jump to `now_ns`
    pub fn set(&self, now_ns: i64) {
        self.now_ns.store(now_ns, Ordering::Release);
    }

    /// Move forward (or backward, for negative values) by `delta_ns`
    pub fn advance(&self, delta_ns: i64) {
        self.now_ns.fetch_add(delta_ns, Ordering::AcqRel);
    }
}

impl ClockSource for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::Acquire)
    }
}
