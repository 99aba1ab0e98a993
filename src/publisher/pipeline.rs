//! Async capture-to-transport loop

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::assigner::{AssignerStats, TimingAssigner};
use crate::error::{PlaytimeError, Result};
use crate::types::{GroupId, Object, ObjectId, TrackName};

const PROGRESS_INTERVAL: u64 = 100;

/// One encoded frame from the capture side
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Encoded media
    pub payload: Bytes,
    /// Wall-clock capture instant, ns since the Unix epoch
    pub capture_time_ns: i64,
    /// Begin a new Group with this frame (e.g. a keyframe)
    pub starts_group: bool,
}

impl CaptureFrame {
    /// Frame continuing the current Group
    #[must_use]
    pub fn new(payload: impl Into<Bytes>, capture_time_ns: i64) -> Self {
        Self {
            payload: payload.into(),
            capture_time_ns,
            starts_group: false,
        }
    }

    /// Frame that opens a new Group
    #[must_use]
    pub fn group_start(payload: impl Into<Bytes>, capture_time_ns: i64) -> Self {
        Self {
            starts_group: true,
            ..Self::new(payload, capture_time_ns)
        }
    }
}

/// Summary returned by [`PublisherPipeline::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublisherReport {
    /// Objects handed to the transport
    pub objects: u64,
    /// Groups opened
    pub groups: u64,
    /// Assigner counters
    pub timing: AssignerStats,
}

/// Turns captured frames into stamped Objects for one Track
#[derive(Debug)]
pub struct PublisherPipeline {
    track: TrackName,
    assigner: TimingAssigner,
    next_group: GroupId,
    current: Option<(GroupId, ObjectId)>,
    objects: u64,
    groups: u64,
}

impl PublisherPipeline {
    /// Create a pipeline starting at Group 0
    #[must_use]
    pub fn new(track: impl Into<TrackName>, assigner: TimingAssigner) -> Self {
        Self {
            track: track.into(),
            assigner,
            next_group: GroupId(0),
            current: None,
            objects: 0,
            groups: 0,
        }
    }

    /// Track being published
    #[must_use]
    pub fn track(&self) -> &TrackName {
        &self.track
    }

    /// Build the next Object from `frame`, allocating ids and stamping it
    ///
    /// # Errors
    ///
    /// Propagates [`TimingAssigner::assign`] failures.
    pub fn next_object(&mut self, frame: CaptureFrame) -> Result<Object> {
        let (group_id, object_id) = match self.current {
            Some((group, object)) if !frame.starts_group => (group, object.next()),
            _ => {
                let group = self.next_group;
                self.next_group = group.next();
                self.groups += 1;
                (group, ObjectId(0))
            }
        };
        self.current = Some((group_id, object_id));

        let mut object = Object::new(self.track.clone(), group_id, object_id, frame.payload);
        self.assigner.assign(&mut object, frame.capture_time_ns)?;
        self.objects += 1;
        Ok(object)
    }

    /// Counters so far
    #[must_use]
    pub fn report(&self) -> PublisherReport {
        PublisherReport {
            objects: self.objects,
            groups: self.groups,
            timing: self.assigner.stats(),
        }
    }

    /// Pump `frames` into `transport` until capture ends or `shutdown` flips
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::Transport`] if the transport side hangs up,
    /// or an assignment error.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<CaptureFrame>,
        transport: mpsc::Sender<Object>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PublisherReport> {
        tracing::info!(track = %self.track, policy = ?self.assigner.policy(), "Publisher started");

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    let Some(frame) = frame else {
                        tracing::info!(track = %self.track, "Capture ended");
                        break;
                    };
                    let object = self.next_object(frame)?;
                    transport.send(object).await.map_err(|_| PlaytimeError::Transport {
                        message: "transport channel closed".to_string(),
                    })?;

                    if self.objects % PROGRESS_INTERVAL == 0 {
                        tracing::info!(track = %self.track, "Published {} objects", self.objects);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!(track = %self.track, "Publisher shutting down");
                        break;
                    }
                }
            }
        }

        let report = self.report();
        tracing::info!(
            track = %self.track,
            objects = report.objects,
            groups = report.groups,
            "Publisher finished"
        );
        Ok(report)
    }
}
