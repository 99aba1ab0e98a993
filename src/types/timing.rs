use serde::{Deserialize, Serialize};

use super::track::ObjectId;

/// Which Objects carry TARGET_PLAYTIME
///
/// Both policies use the same extension type; they differ only in which
/// Objects are stamped. There is deliberately no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TimingPolicy {
    /// Every Object is stamped; values never decrease within a Group
    PerObject,
    /// Only the first Object of each Group is stamped; later Objects are
    /// offset from the anchor by their position times `frame_duration_ns`
    GroupAnchor {
        /// Presentation duration of one Object
        frame_duration_ns: i64,
    },
}

impl TimingPolicy {
    /// Presentation offset of `object_id` relative to the Group anchor.
    ///
    /// Always zero in per-object mode.
    #[must_use]
    pub fn derive_offset_ns(self, anchor: ObjectId, object_id: ObjectId) -> i64 {
        match self {
            Self::PerObject => 0,
            Self::GroupAnchor { frame_duration_ns } => {
                let index = i64::try_from(object_id.0.saturating_sub(anchor.0)).unwrap_or(i64::MAX);
                index.saturating_mul(frame_duration_ns)
            }
        }
    }

    /// Whether every Object is expected to carry its own timestamp
    #[must_use]
    pub fn stamps_every_object(self) -> bool {
        matches!(self, Self::PerObject)
    }
}
