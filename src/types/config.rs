use serde::{Deserialize, Serialize};

use crate::consumer::calibrator::CalibratorConfig;
use crate::consumer::scheduler::{DrainPolicy, SchedulerConfig};
use crate::error::{PlaytimeError, Result};
use crate::relay::{PlaytimeRequirement, RelayConfig};

/// Timing configuration shared by publisher, relay and consumer
///
/// All durations are nanoseconds. Missing fields fall back to
/// [`PlaytimeConfig::default`] when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaytimeConfig {
    /// Delay added to capture time by the publisher (default: 150ms)
    pub global_delay_ns: i64,

    /// Delay between release and the payload reaching the physical output (default: 0)
    pub output_latency_ns: i64,

    /// How far behind local time a timestamp may fall (default: 1s)
    pub staleness_bound_past_ns: i64,

    /// How far ahead of local time a timestamp may be (default: 5s)
    pub staleness_bound_future_ns: i64,

    /// Jitter margin accumulated before playback starts (default: 30ms)
    pub jitter_buffer_target_ns: i64,

    /// Lateness beyond which an Object is dropped instead of released (default: 100ms)
    pub lateness_drop_threshold_ns: i64,

    /// Weight of a new sample in the drift EMA, in (0, 1] (default: 0.05)
    pub drift_filter_alpha: f64,

    /// Samples further than this from the current estimate are not filtered (default: 50ms)
    pub drift_outlier_bound_ns: i64,

    /// Drift magnitude reported as clock divergence (default: 250ms)
    pub drift_sanity_bound_ns: i64,

    /// What happens to pending Objects at end of track
    pub drain_policy: DrainPolicy,

    /// Which Objects a relay requires to carry TARGET_PLAYTIME (default: group anchors)
    pub playtime_requirement: PlaytimeRequirement,

    /// Groups a relay keeps cached per track (default: 64)
    pub max_groups_per_track: usize,

    /// Per-subscriber queue depth at the relay (default: 256)
    pub subscriber_queue_depth: usize,
}

impl Default for PlaytimeConfig {
    fn default() -> Self {
        Self {
            global_delay_ns: 150_000_000,
            output_latency_ns: 0,
            staleness_bound_past_ns: 1_000_000_000,
            staleness_bound_future_ns: 5_000_000_000,
            jitter_buffer_target_ns: 30_000_000,
            lateness_drop_threshold_ns: 100_000_000,
            drift_filter_alpha: 0.05,
            drift_outlier_bound_ns: 50_000_000,
            drift_sanity_bound_ns: 250_000_000,
            drain_policy: DrainPolicy::HonorDeadlines,
            playtime_requirement: PlaytimeRequirement::GroupAnchor,
            max_groups_per_track: 64,
            subscriber_queue_depth: 256,
        }
    }
}

impl PlaytimeConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> PlaytimeConfigBuilder {
        PlaytimeConfigBuilder::default()
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("global_delay_ns", self.global_delay_ns),
            ("output_latency_ns", self.output_latency_ns),
            ("staleness_bound_past_ns", self.staleness_bound_past_ns),
            ("staleness_bound_future_ns", self.staleness_bound_future_ns),
            ("jitter_buffer_target_ns", self.jitter_buffer_target_ns),
            ("lateness_drop_threshold_ns", self.lateness_drop_threshold_ns),
            ("drift_outlier_bound_ns", self.drift_outlier_bound_ns),
            ("drift_sanity_bound_ns", self.drift_sanity_bound_ns),
        ];
        for (name, value) in non_negative {
            if value < 0 {
                return Err(invalid(name, format!("must not be negative, got {value}")));
            }
        }

        if !(self.drift_filter_alpha > 0.0 && self.drift_filter_alpha <= 1.0) {
            return Err(invalid(
                "drift_filter_alpha",
                format!("must be in (0, 1], got {}", self.drift_filter_alpha),
            ));
        }
        if self.max_groups_per_track == 0 {
            return Err(invalid("max_groups_per_track", "must be at least 1".into()));
        }
        if self.subscriber_queue_depth == 0 {
            return Err(invalid("subscriber_queue_depth", "must be at least 1".into()));
        }
        Ok(())
    }

    /// Parse a JSON document, validating the result
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::InvalidParameter`] on parse or validation failure.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| invalid("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for a consumer's clock calibrator
    #[must_use]
    pub fn calibrator(&self) -> CalibratorConfig {
        CalibratorConfig {
            output_latency_ns: self.output_latency_ns,
            staleness_bound_past_ns: self.staleness_bound_past_ns,
            staleness_bound_future_ns: self.staleness_bound_future_ns,
            drift_filter_alpha: self.drift_filter_alpha,
            drift_outlier_bound_ns: self.drift_outlier_bound_ns,
            drift_sanity_bound_ns: self.drift_sanity_bound_ns,
        }
    }

    /// Settings for a consumer's playback scheduler
    #[must_use]
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            jitter_buffer_target_ns: self.jitter_buffer_target_ns,
            lateness_drop_threshold_ns: self.lateness_drop_threshold_ns,
            drain_policy: self.drain_policy,
        }
    }

    /// Settings for a relay
    #[must_use]
    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            requirement: self.playtime_requirement,
            max_groups_per_track: self.max_groups_per_track,
            subscriber_queue_depth: self.subscriber_queue_depth,
        }
    }
}

fn invalid(name: &str, message: String) -> PlaytimeError {
    PlaytimeError::InvalidParameter {
        name: name.to_string(),
        message,
    }
}

/// Builder for `PlaytimeConfig`
#[derive(Debug, Clone, Default)]
pub struct PlaytimeConfigBuilder {
    config: PlaytimeConfig,
}

impl PlaytimeConfigBuilder {
    /// Set the publisher's global delay
    #[must_use]
    pub fn global_delay_ns(mut self, delay: i64) -> Self {
        self.config.global_delay_ns = delay;
        self
    }

    /// Set the consumer's output latency
    #[must_use]
    pub fn output_latency_ns(mut self, latency: i64) -> Self {
        self.config.output_latency_ns = latency;
        self
    }

    /// Set both staleness bounds
    #[must_use]
    pub fn staleness_bounds_ns(mut self, past: i64, future: i64) -> Self {
        self.config.staleness_bound_past_ns = past;
        self.config.staleness_bound_future_ns = future;
        self
    }

    /// Set the jitter buffer target
    #[must_use]
    pub fn jitter_buffer_target_ns(mut self, target: i64) -> Self {
        self.config.jitter_buffer_target_ns = target;
        self
    }

    /// Set the lateness drop threshold
    #[must_use]
    pub fn lateness_drop_threshold_ns(mut self, threshold: i64) -> Self {
        self.config.lateness_drop_threshold_ns = threshold;
        self
    }

    /// Set the drift filter weight
    #[must_use]
    pub fn drift_filter_alpha(mut self, alpha: f64) -> Self {
        self.config.drift_filter_alpha = alpha;
        self
    }

    /// Set the drift outlier and sanity bounds
    #[must_use]
    pub fn drift_bounds_ns(mut self, outlier: i64, sanity: i64) -> Self {
        self.config.drift_outlier_bound_ns = outlier;
        self.config.drift_sanity_bound_ns = sanity;
        self
    }

    /// Set the end-of-track drain policy
    #[must_use]
    pub fn drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.config.drain_policy = policy;
        self
    }

    /// Set what a relay requires of TARGET_PLAYTIME
    #[must_use]
    pub fn playtime_requirement(mut self, requirement: PlaytimeRequirement) -> Self {
        self.config.playtime_requirement = requirement;
        self
    }

    /// Set the relay cache depth in groups
    #[must_use]
    pub fn max_groups_per_track(mut self, groups: usize) -> Self {
        self.config.max_groups_per_track = groups;
        self
    }

    /// Set the per-subscriber queue depth
    #[must_use]
    pub fn subscriber_queue_depth(mut self, depth: usize) -> Self {
        self.config.subscriber_queue_depth = depth;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// See [`PlaytimeConfig::validate`].
    pub fn build(self) -> Result<PlaytimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
