//! Presentation sinks

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{PlaytimeError, Result};

/// An item handed to the output at its deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presented<T> {
    /// The released item
    pub item: T,
    /// Deadline it was scheduled for
    pub deadline_ns: i64,
    /// Local time at which it was actually released
    pub released_at_ns: i64,
}

impl<T> Presented<T> {
    /// Release time minus deadline
    #[must_use]
    pub fn lateness_ns(&self) -> i64 {
        self.released_at_ns.saturating_sub(self.deadline_ns)
    }
}

/// Destination for released items (decoder, audio device, renderer)
#[async_trait]
pub trait OutputSink<T: Send + 'static>: Send + 'static {
    /// Present one item
    async fn present(&mut self, presented: Presented<T>) -> Result<()>;
}

/// Sink that forwards released items over a channel
#[derive(Debug)]
pub struct ChannelSink<T> {
    tx: mpsc::Sender<Presented<T>>,
}

impl<T> ChannelSink<T> {
    /// Create a sink and the receiving end of its channel
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Presented<T>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl<T: Send + 'static> OutputSink<T> for ChannelSink<T> {
    async fn present(&mut self, presented: Presented<T>) -> Result<()> {
        self.tx
            .send(presented)
            .await
            .map_err(|_| PlaytimeError::Transport {
                message: "output channel closed".to_string(),
            })
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl<T: Send + 'static> OutputSink<T> for NullSink {
    async fn present(&mut self, _presented: Presented<T>) -> Result<()> {
        Ok(())
    }
}
