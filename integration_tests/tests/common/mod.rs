//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::{Arc, Once};

use moq_playtime::clock::{AnchoredClock, SharedClock};
use moq_playtime::consumer::{ChannelSink, Presented, TrackPlayout};
use moq_playtime::{CachedObject, PlaytimeConfig, TimingPolicy};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

pub const MS: i64 = 1_000_000;
pub const START: i64 = 1_700_000_000_000 * MS;

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env()
            .add_directive("moq_playtime=debug".parse().unwrap());

        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

/// Clock pinned to [`START`] and advanced by tokio's paused timer
pub fn test_clock() -> SharedClock {
    Arc::new(AnchoredClock::new(START))
}

/// Consumer config with the given output latency
pub fn consumer_config(output_latency_ns: i64) -> PlaytimeConfig {
    PlaytimeConfig::builder()
        .output_latency_ns(output_latency_ns)
        .build()
        .unwrap()
}

/// Per-object consumer delivering into a channel
pub fn consumer(
    config: &PlaytimeConfig,
    clock: SharedClock,
) -> (TrackPlayout, mpsc::Receiver<Presented<CachedObject>>) {
    let (sink, rx) = ChannelSink::new(256);
    let playout = TrackPlayout::new("audio", TimingPolicy::PerObject, config, clock, sink);
    (playout, rx)
}

/// Collect everything presented until the sink closes
pub async fn collect(
    mut rx: mpsc::Receiver<Presented<CachedObject>>,
) -> Vec<Presented<CachedObject>> {
    let mut out = Vec::new();
    while let Some(event) = rx.recv().await {
        out.push(event);
    }
    out
}
