//! # moq-playtime
//!
//! Synchronized playback for Media over QUIC tracks using the
//! `TARGET_PLAYTIME` Object extension header.
//!
//! ## Features
//!
//! - Extension header codec (`TARGET_PLAYTIME`, type `0x31`)
//! - Publisher-side timing assignment, per Object or per Group anchor
//! - Relay-side validation, caching and byte-identical fan-out
//! - Consumer-side clock calibration with drift smoothing
//! - Deadline-driven playout scheduling with a jitter buffer
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use moq_playtime::clock::SystemClock;
//! use moq_playtime::consumer::{ChannelSink, TrackPlayout};
//! use moq_playtime::relay::Relay;
//! use moq_playtime::{PlaytimeConfig, TimingPolicy};
//!
//! # async fn example() -> Result<(), moq_playtime::PlaytimeError> {
//! let config = PlaytimeConfig::default();
//! let relay = Relay::new(config.relay());
//!
//! // Subscribe a consumer before the publisher starts
//! let subscription = relay.subscribe("audio").await?;
//! let (sink, mut presented) = ChannelSink::new(64);
//! let playout = TrackPlayout::new(
//!     "audio",
//!     TimingPolicy::PerObject,
//!     &config,
//!     Arc::new(SystemClock),
//!     sink,
//! );
//! tokio::spawn(playout.run(subscription.into_receiver()));
//!
//! while let Some(event) = presented.recv().await {
//!     println!("presented {} at {}", event.item.key(), event.released_at_ns);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Each role is a module and they share only [`types`] and [`protocol`]:
//!
//! - **Publisher**: [`publisher::TimingAssigner`] stamps Objects
//! - **Relay**: [`relay::Relay`] enforces invariants without a clock
//! - **Consumer**: [`consumer::TrackPlayout`] calibrates and schedules

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Time sources
pub mod clock;
/// Error types
pub mod error;
/// Wire codecs
pub mod protocol;
/// Core types
pub mod types;

/// Consumer calibration and playout
pub mod consumer;
/// Publisher timing assignment
pub mod publisher;
/// Relay enforcement and caching
pub mod relay;

/// Testing utilities
pub mod testing;

// Re-exports
pub use clock::{ClockSource, SharedClock};
pub use consumer::{ClockCalibrator, PlaybackScheduler, TrackPlayout};
pub use error::{PlaytimeError, Result};
pub use protocol::{ExtensionHeader, ExtensionHeaders, TARGET_PLAYTIME};
pub use publisher::{PublisherPipeline, TimingAssigner};
pub use relay::{PlaytimeRequirement, Relay};
pub use types::{
    CachedObject, GroupId, Object, ObjectId, ObjectKey, PlaytimeConfig, TimingPolicy, TrackName,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        CachedObject, ClockCalibrator, ClockSource, GroupId, Object, ObjectId, PlaybackScheduler,
        PlaytimeConfig, PlaytimeError, PlaytimeRequirement, PublisherPipeline, Relay,
        SharedClock, TimingAssigner, TimingPolicy, TrackName, TrackPlayout,
    };
}
