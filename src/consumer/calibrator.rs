//! Consumer clock calibration
//!
//! Turns (TARGET_PLAYTIME, local arrival) pairs into local playback
//! deadlines. The calibrator keeps a smoothed estimate of how far the
//! publisher's clock has drifted from ours since the first accepted sample,
//! rejects implausible timestamps and reports runaway drift.

use serde::Serialize;

use crate::error::{PlaytimeError, Result, Staleness};
use crate::types::PlaytimeConfig;

/// Calibrator settings, see [`PlaytimeConfig::calibrator`]
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratorConfig {
    /// Delay between release and physical output
    pub output_latency_ns: i64,
    /// How far behind local time a corrected timestamp may fall
    pub staleness_bound_past_ns: i64,
    /// How far ahead of local time a corrected timestamp may be
    pub staleness_bound_future_ns: i64,
    /// EMA weight of a new sample
    pub drift_filter_alpha: f64,
    /// Deviation from the estimate beyond which a sample is not filtered
    pub drift_outlier_bound_ns: i64,
    /// Drift magnitude reported as divergence
    pub drift_sanity_bound_ns: i64,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        PlaytimeConfig::default().calibrator()
    }
}

/// Drift beyond the sanity bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Current drift estimate
    pub drift_ns: i64,
    /// Configured bound
    pub bound_ns: i64,
}

impl From<Divergence> for PlaytimeError {
    fn from(d: Divergence) -> Self {
        PlaytimeError::ClockDivergence {
            drift_ns: d.drift_ns,
            bound_ns: d.bound_ns,
        }
    }
}

/// Result of an accepted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Local instant at which the Object should be released
    pub deadline_ns: i64,
    /// Drift estimate used for `deadline_ns`
    pub drift_ns: i64,
    /// The sample was accepted but kept out of the drift filter
    pub outlier: bool,
    /// Set when the estimate is beyond the sanity bound
    pub divergence: Option<Divergence>,
}

/// Calibrator counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalibratorStats {
    /// Samples accepted (outliers included)
    pub accepted: u64,
    /// Rejected as too far in the past
    pub rejected_past: u64,
    /// Rejected as too far in the future
    pub rejected_future: u64,
    /// Accepted samples kept out of the filter
    pub outliers: u64,
    /// Accepted samples that reported divergence
    pub divergences: u64,
}

/// Per-track clock calibrator
#[derive(Debug)]
pub struct ClockCalibrator {
    config: CalibratorConfig,
    /// Headroom (target - arrival) of the first accepted sample
    baseline_ns: Option<i64>,
    /// Smoothed drift relative to the baseline
    drift_ns: f64,
    stats: CalibratorStats,
}

impl ClockCalibrator {
    /// Create an uncalibrated instance
    #[must_use]
    pub fn new(config: CalibratorConfig) -> Self {
        Self {
            config,
            baseline_ns: None,
            drift_ns: 0.0,
            stats: CalibratorStats::default(),
        }
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    /// Whether a baseline has been recorded
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.baseline_ns.is_some()
    }

    /// Current drift estimate, rounded to whole nanoseconds
    #[must_use]
    pub fn drift_estimate_ns(&self) -> i64 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "saturating float-to-int cast"
        )]
        let drift = self.drift_ns.round() as i64;
        drift
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> CalibratorStats {
        self.stats
    }

    /// Forget the baseline and estimate; counters are kept
    pub fn reset(&mut self) {
        self.baseline_ns = None;
        self.drift_ns = 0.0;
        tracing::debug!("Calibrator reset");
    }

    /// Feed one sample and compute its playback deadline.
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::StalenessRejected`] if the drift-corrected
    /// timestamp is outside the plausibility window around `arrival_ns`.
    /// Rejected samples leave the estimate untouched.
    pub fn observe(&mut self, target_playtime_ns: i64, arrival_ns: i64) -> Result<Calibration> {
        self.check_plausible(target_playtime_ns, arrival_ns)?;

        let headroom = target_playtime_ns.saturating_sub(arrival_ns);
        let outlier = match self.baseline_ns {
            None => {
                self.baseline_ns = Some(headroom);
                tracing::info!(headroom_ns = headroom, "Calibrator: baseline established");
                false
            }
            Some(baseline) => self.filter(headroom.saturating_sub(baseline)),
        };
        self.stats.accepted += 1;

        let drift_ns = self.drift_estimate_ns();
        let deadline_ns = target_playtime_ns
            .saturating_sub(self.config.output_latency_ns)
            .saturating_sub(drift_ns);

        let divergence = if drift_ns.unsigned_abs() > self.config.drift_sanity_bound_ns.unsigned_abs()
        {
            self.stats.divergences += 1;
            tracing::debug!(
                drift_ns,
                bound_ns = self.config.drift_sanity_bound_ns,
                "Clock drift beyond sanity bound"
            );
            Some(Divergence {
                drift_ns,
                bound_ns: self.config.drift_sanity_bound_ns,
            })
        } else {
            None
        };

        Ok(Calibration {
            deadline_ns,
            drift_ns,
            outlier,
            divergence,
        })
    }

    fn check_plausible(&mut self, target_playtime_ns: i64, arrival_ns: i64) -> Result<()> {
        let corrected = target_playtime_ns.saturating_sub(self.drift_estimate_ns());
        let offset = corrected.saturating_sub(arrival_ns);

        if offset < 0 && offset.unsigned_abs() > self.config.staleness_bound_past_ns.unsigned_abs() {
            self.stats.rejected_past += 1;
            return Err(PlaytimeError::StalenessRejected {
                direction: Staleness::Past,
                offset_ns: offset.saturating_neg(),
                bound_ns: self.config.staleness_bound_past_ns,
            });
        }
        if offset > self.config.staleness_bound_future_ns {
            self.stats.rejected_future += 1;
            return Err(PlaytimeError::StalenessRejected {
                direction: Staleness::Future,
                offset_ns: offset,
                bound_ns: self.config.staleness_bound_future_ns,
            });
        }
        Ok(())
    }

    /// Apply one drift sample to the EMA. Returns true if it was an outlier.
    #[allow(clippy::cast_precision_loss, reason = "ns offsets well inside f64 range")]
    fn filter(&mut self, sample_ns: i64) -> bool {
        let sample = sample_ns as f64;
        let deviation = (sample - self.drift_ns).abs();
        if deviation > self.config.drift_outlier_bound_ns as f64 {
            self.stats.outliers += 1;
            tracing::debug!(
                sample_ns,
                estimate_ns = self.drift_estimate_ns(),
                "Calibrator: excluding outlier sample"
            );
            return true;
        }

        let alpha = self.config.drift_filter_alpha;
        self.drift_ns = alpha.mul_add(sample, (1.0 - alpha) * self.drift_ns);
        false
    }
}
