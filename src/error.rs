use std::fmt;

use thiserror::Error;

use crate::protocol::ExtensionError;
use crate::types::{GroupId, TrackName};

/// Which staleness bound a timestamp crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Too far behind local time (stale replay)
    Past,
    /// Too far ahead of local time (corrupt or hostile)
    Future,
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Past => f.write_str("past"),
            Self::Future => f.write_str("future"),
        }
    }
}

/// Errors raised while publishing, relaying or playing out timed Objects
#[derive(Debug, Error)]
pub enum PlaytimeError {
    // ===== Fatal to the Track =====
    /// Duplicate, wrong-length or undecodable TARGET_PLAYTIME
    #[error("protocol violation on track {track}: {source}")]
    ProtocolViolation {
        /// Track that carried the bad Object
        track: TrackName,
        /// What was wrong with the extension
        #[source]
        source: ExtensionError,
    },

    /// Track was already marked malformed
    #[error("track {track} rejected after an earlier protocol violation")]
    TrackRejected {
        /// Rejected track
        track: TrackName,
    },

    // ===== Recovered locally by drop-and-count =====
    /// Timestamp outside the plausibility window
    #[error("TARGET_PLAYTIME {offset_ns}ns in the {direction} exceeds bound {bound_ns}ns")]
    StalenessRejected {
        /// Which bound was crossed
        direction: Staleness,
        /// Distance from local time in nanoseconds
        offset_ns: i64,
        /// Configured bound
        bound_ns: i64,
    },

    /// Deadline elapsed before the Object could be released
    #[error("deadline missed by {lateness_ns}ns (threshold {threshold_ns}ns)")]
    LateDrop {
        /// How late the Object was
        lateness_ns: i64,
        /// Configured threshold
        threshold_ns: i64,
    },

    /// Drift estimate beyond the sanity bound
    #[error("clock drift {drift_ns}ns exceeds sanity bound {bound_ns}ns")]
    ClockDivergence {
        /// Current drift estimate
        drift_ns: i64,
        /// Configured bound
        bound_ns: i64,
    },

    /// Group-anchor Object arrived before (or without) its Group's anchor
    #[error("no anchor timestamp for group {group_id}")]
    Unanchored {
        /// Group missing its anchor
        group_id: GroupId,
    },

    // ===== Lifecycle / usage =====
    /// Scheduler no longer accepts Objects
    #[error("scheduler closed")]
    SchedulerClosed,

    /// Invalid parameter provided
    #[error("invalid parameter: {name} - {message}")]
    InvalidParameter {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },

    /// The transport collaborator went away
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },
}

impl PlaytimeError {
    /// Whether this error closes the Track
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProtocolViolation { .. } | Self::TrackRejected { .. }
        )
    }

    /// Whether this error is handled by dropping one Object and counting it
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StalenessRejected { .. }
                | Self::LateDrop { .. }
                | Self::ClockDivergence { .. }
                | Self::Unanchored { .. }
        )
    }
}

/// Result type alias for playtime operations
pub type Result<T> = std::result::Result<T, PlaytimeError>;
