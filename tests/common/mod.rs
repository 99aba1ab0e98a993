//! Shared fixtures for the end-to-end tests
#![allow(dead_code)]

use std::sync::{Arc, Once};

use moq_playtime::clock::{AnchoredClock, SharedClock};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub const MS: i64 = 1_000_000;

/// Wall-clock time the simulated clocks start at
pub const START: i64 = 1_700_000_000_000 * MS;

/// Initialize test logging (safe to call from every test)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("moq_playtime=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Clock starting at [`START`] and driven by tokio's (paused) timer
pub fn paused_clock() -> SharedClock {
    Arc::new(AnchoredClock::new(START))
}
