use serde::Serialize;

use crate::error::{PlaytimeError, Result};
use crate::types::{GroupId, Object, PlaytimeConfig, TimingPolicy};

/// Counters kept by a [`TimingAssigner`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssignerStats {
    /// Objects given a TARGET_PLAYTIME
    pub stamped: u64,
    /// Objects left without one (group-anchor followers)
    pub unstamped: u64,
    /// Per-object values raised to keep the Group non-decreasing
    pub clamped: u64,
}

/// Assigns TARGET_PLAYTIME to outgoing Objects
///
/// One assigner per Track. Objects must be presented in production order.
#[derive(Debug)]
pub struct TimingAssigner {
    policy: TimingPolicy,
    global_delay_ns: i64,
    current_group: Option<GroupId>,
    last_in_group: Option<i64>,
    stats: AssignerStats,
}

impl TimingAssigner {
    /// Create an assigner with an explicit policy
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::InvalidParameter`] for a negative delay or a
    /// non-positive group-anchor frame duration.
    pub fn new(policy: TimingPolicy, global_delay_ns: i64) -> Result<Self> {
        if global_delay_ns < 0 {
            return Err(PlaytimeError::InvalidParameter {
                name: "global_delay_ns".to_string(),
                message: format!("must not be negative, got {global_delay_ns}"),
            });
        }
        if let TimingPolicy::GroupAnchor { frame_duration_ns } = policy {
            if frame_duration_ns <= 0 {
                return Err(PlaytimeError::InvalidParameter {
                    name: "frame_duration_ns".to_string(),
                    message: format!("must be positive, got {frame_duration_ns}"),
                });
            }
        }

        Ok(Self {
            policy,
            global_delay_ns,
            current_group: None,
            last_in_group: None,
            stats: AssignerStats::default(),
        })
    }

    /// Create an assigner using `config.global_delay_ns`
    ///
    /// # Errors
    ///
    /// See [`TimingAssigner::new`].
    pub fn from_config(policy: TimingPolicy, config: &PlaytimeConfig) -> Result<Self> {
        Self::new(policy, config.global_delay_ns)
    }

    /// The selected policy
    #[must_use]
    pub fn policy(&self) -> TimingPolicy {
        self.policy
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> AssignerStats {
        self.stats
    }

    /// `capture_time_ns + global_delay_ns`
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::InvalidParameter`] if the sum leaves the i64 range.
    pub fn target_for(&self, capture_time_ns: i64) -> Result<i64> {
        capture_time_ns
            .checked_add(self.global_delay_ns)
            .ok_or_else(|| PlaytimeError::InvalidParameter {
                name: "capture_time_ns".to_string(),
                message: format!("{capture_time_ns} + delay overflows"),
            })
    }

    /// Stamp `object` according to the policy.
    ///
    /// Returns the value written, or `None` if this Object is not stamped.
    ///
    /// # Errors
    ///
    /// Fails if the capture time overflows or the Object's existing
    /// extension block cannot be parsed.
    pub fn assign(&mut self, object: &mut Object, capture_time_ns: i64) -> Result<Option<i64>> {
        let starts_group = self.current_group != Some(object.group_id);
        if starts_group {
            self.current_group = Some(object.group_id);
            self.last_in_group = None;
        }

        if !starts_group && !self.policy.stamps_every_object() {
            self.stats.unstamped += 1;
            return Ok(None);
        }

        let mut target = self.target_for(capture_time_ns)?;
        if let Some(last) = self.last_in_group {
            if target < last {
                tracing::debug!(
                    group = %object.group_id,
                    object = %object.object_id,
                    computed = target,
                    previous = last,
                    "capture clock went backwards; holding TARGET_PLAYTIME"
                );
                target = last;
                self.stats.clamped += 1;
            }
        }

        let track = object.track.clone();
        let violation = |source| PlaytimeError::ProtocolViolation {
            track: track.clone(),
            source,
        };
        let mut headers = object.extension_headers().map_err(violation)?;
        headers.set_target_playtime(target);
        object.set_extension_headers(&headers).map_err(violation)?;

        self.last_in_group = Some(target);
        self.stats.stamped += 1;
        Ok(Some(target))
    }
}
