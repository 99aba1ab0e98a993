//! Relay side: enforce TARGET_PLAYTIME invariants, cache, fan out
//!
//! A relay never looks at a clock and never re-encodes extension headers.
//! Objects are validated once, stored as shared read-only
//! [`CachedObject`](crate::types::CachedObject)s and handed to every
//! subscriber as the same allocation.

pub mod cache;
pub mod enforcer;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

pub use cache::{CacheInsert, ObjectCache};
pub use enforcer::{Forwarded, Relay, SubscriberId, Subscription};

use crate::types::{ObjectId, PlaytimeConfig};

/// Which Objects must carry TARGET_PLAYTIME
///
/// Objects not covered by the requirement may still carry at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaytimeRequirement {
    /// Never required
    Optional,
    /// Required on every Object (per-object timing)
    EveryObject,
    /// Required on the first Object (id 0) of every Group
    #[default]
    GroupAnchor,
}

impl PlaytimeRequirement {
    /// Whether an Object with this id must be stamped
    #[must_use]
    pub fn requires_stamp(self, object_id: ObjectId) -> bool {
        match self {
            Self::Optional => false,
            Self::EveryObject => true,
            Self::GroupAnchor => object_id == ObjectId(0),
        }
    }
}

/// Relay settings, see [`PlaytimeConfig::relay`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Which Objects must be stamped
    pub requirement: PlaytimeRequirement,
    /// Groups kept per track before the oldest is evicted
    pub max_groups_per_track: usize,
    /// Capacity of each subscriber's queue
    pub subscriber_queue_depth: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        PlaytimeConfig::default().relay()
    }
}

/// Relay counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Objects validated and newly cached
    pub accepted: u64,
    /// Objects already cached (first write wins)
    pub duplicates: u64,
    /// Objects evicted with their Group
    pub evicted: u64,
    /// Objects refused (violation or rejected track)
    pub rejected: u64,
    /// Deliveries skipped because a subscriber queue was full
    pub lagged: u64,
    /// Tracks marked malformed
    pub malformed_tracks: u64,
}
