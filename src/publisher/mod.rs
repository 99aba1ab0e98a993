//! Publisher side: stamping Objects with TARGET_PLAYTIME
//!
//! The [`TimingAssigner`] decides which Objects carry the extension and
//! computes `capture_time + global_delay`. [`PublisherPipeline`] wraps it in
//! an async loop that turns captured frames into Objects for the transport.

pub mod assigner;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use assigner::{AssignerStats, TimingAssigner};
pub use pipeline::{CaptureFrame, PublisherPipeline, PublisherReport};
