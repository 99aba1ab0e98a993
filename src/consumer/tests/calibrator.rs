use crate::consumer::calibrator::{CalibratorConfig, ClockCalibrator, Divergence};
use crate::error::{PlaytimeError, Staleness};

const MS: i64 = 1_000_000;
const NOW: i64 = 1_700_000_000_000_000_000;

fn config(alpha: f64) -> CalibratorConfig {
    CalibratorConfig {
        output_latency_ns: 10 * MS,
        staleness_bound_past_ns: 1_000 * MS,
        staleness_bound_future_ns: 5_000 * MS,
        drift_filter_alpha: alpha,
        drift_outlier_bound_ns: 50 * MS,
        drift_sanity_bound_ns: 250 * MS,
    }
}

#[test]
fn test_first_sample_sets_baseline() {
    let mut cal = ClockCalibrator::new(config(0.05));
    assert!(!cal.is_calibrated());

    let c = cal.observe(NOW + 150 * MS, NOW + 20 * MS).unwrap();
    assert!(cal.is_calibrated());
    assert_eq!(c.drift_ns, 0);
    assert_eq!(c.deadline_ns, NOW + 140 * MS);
    assert!(!c.outlier);
    assert_eq!(c.divergence, None);
}

#[test]
fn test_stale_timestamp_rejected() {
    let mut cal = ClockCalibrator::new(config(0.05));

    let err = cal.observe(NOW - 10_000 * MS, NOW).unwrap_err();
    assert!(matches!(
        err,
        PlaytimeError::StalenessRejected {
            direction: Staleness::Past,
            offset_ns,
            bound_ns,
        } if offset_ns == 10_000 * MS && bound_ns == 1_000 * MS
    ));
    assert!(err.is_recoverable());
    assert!(!cal.is_calibrated());
    assert_eq!(cal.stats().rejected_past, 1);
    assert_eq!(cal.stats().accepted, 0);
}

#[test]
fn test_future_timestamp_rejected() {
    let mut cal = ClockCalibrator::new(config(0.05));

    let err = cal.observe(NOW + 6_000 * MS, NOW).unwrap_err();
    assert!(matches!(
        err,
        PlaytimeError::StalenessRejected {
            direction: Staleness::Future,
            ..
        }
    ));
    assert_eq!(cal.stats().rejected_future, 1);
}

#[test]
fn test_bounds_are_inclusive() {
    let mut cal = ClockCalibrator::new(config(0.05));
    assert!(cal.observe(NOW - 1_000 * MS, NOW).is_ok());

    let mut cal = ClockCalibrator::new(config(0.05));
    assert!(cal.observe(NOW + 5_000 * MS, NOW).is_ok());
}

#[test]
fn test_drift_is_smoothed() {
    let mut cal = ClockCalibrator::new(config(0.5));
    cal.observe(NOW + 150 * MS, NOW).unwrap();

    // 10ms more headroom than the baseline: half of it enters the estimate
    let c = cal.observe(NOW + 1_160 * MS, NOW + 1_000 * MS).unwrap();
    assert_eq!(c.drift_ns, 5 * MS);
    assert_eq!(c.deadline_ns, NOW + 1_160 * MS - 10 * MS - 5 * MS);
    assert_eq!(cal.drift_estimate_ns(), 5 * MS);
}

#[test]
fn test_outlier_excluded_from_filter() {
    let mut cal = ClockCalibrator::new(config(0.5));
    cal.observe(NOW + 150 * MS, NOW).unwrap();

    let c = cal.observe(NOW + 1_350 * MS, NOW + 1_000 * MS).unwrap();
    assert!(c.outlier);
    assert_eq!(c.drift_ns, 0);
    assert_eq!(cal.stats().outliers, 1);
    assert_eq!(cal.stats().accepted, 2);
}

#[test]
fn test_rejected_sample_leaves_estimate() {
    let mut cal = ClockCalibrator::new(config(0.5));
    cal.observe(NOW + 150 * MS, NOW).unwrap();
    cal.observe(NOW + 1_160 * MS, NOW + 1_000 * MS).unwrap();

    assert!(cal.observe(NOW - 60_000 * MS, NOW + 2_000 * MS).is_err());
    assert_eq!(cal.drift_estimate_ns(), 5 * MS);
}

#[test]
fn test_divergence_reported() {
    let mut cfg = config(1.0);
    cfg.drift_outlier_bound_ns = 1_000 * MS;
    cfg.drift_sanity_bound_ns = 100 * MS;
    let mut cal = ClockCalibrator::new(cfg);
    cal.observe(NOW + 150 * MS, NOW).unwrap();

    let c = cal.observe(NOW + 1_350 * MS, NOW + 1_000 * MS).unwrap();
    assert_eq!(
        c.divergence,
        Some(Divergence {
            drift_ns: 200 * MS,
            bound_ns: 100 * MS,
        })
    );
    assert_eq!(cal.stats().divergences, 1);

    let err = PlaytimeError::from(c.divergence.unwrap());
    assert!(matches!(err, PlaytimeError::ClockDivergence { .. }));
    assert!(!err.is_fatal());
}

#[test]
fn test_reset_clears_estimate() {
    let mut cal = ClockCalibrator::new(config(0.5));
    cal.observe(NOW + 150 * MS, NOW).unwrap();
    cal.observe(NOW + 1_160 * MS, NOW + 1_000 * MS).unwrap();

    cal.reset();
    assert!(!cal.is_calibrated());
    assert_eq!(cal.drift_estimate_ns(), 0);
    assert_eq!(cal.stats().accepted, 2);
}

#[test]
fn test_default_config_matches_playtime_defaults() {
    let cfg = CalibratorConfig::default();
    assert_eq!(cfg.staleness_bound_past_ns, 1_000 * MS);
    assert!((cfg.drift_filter_alpha - 0.05).abs() < f64::EPSILON);
}
