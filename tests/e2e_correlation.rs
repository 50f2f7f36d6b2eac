//! E2E tests for whole-stream offset estimation
//!
//! Covers the self-consistency and shift laws of the cross-correlator and
//! checks it agrees with the per-stream whistle detector.

mod common;

use std::time::Duration;

use approx::assert_abs_diff_eq;
use common::{delayed, noise_burst, tone_recording, whistle_recording, RATE};
use whistlesync::audio::correlation::offset;
use whistlesync::audio::detector::whistle_onset;
use whistlesync::sync::planner::align;
use whistlesync::{
    CorrelationLimits, CrossCorrelator, DetectionThreshold, FrequencyBand, SyncError, Waveform,
};

/// A waveform correlated with itself has zero offset
#[test]
fn test_self_offset_is_zero() {
    for wf in [
        noise_burst(10_000, 1000, 2000),
        noise_burst(RATE as usize, 0, RATE as usize),
        whistle_recording(2.0, 0.7, 0.8),
    ] {
        let t = offset(&wf, &wf).unwrap();
        assert_eq!(t.as_secs(), 0.0, "Self offset of {} samples", wf.len());
    }
}

/// Delaying the second input by n samples gives +n / rate
#[test]
fn test_shift_law_positive() {
    let wf = noise_burst(10_000, 1000, 2000);
    for n in [1usize, 100, 4410] {
        let t = offset(&wf, &delayed(&wf, n)).unwrap();
        assert_abs_diff_eq!(t.as_secs(), n as f64 / RATE as f64, epsilon = 1e-12);
    }
}

/// Delaying the first input instead flips the sign
#[test]
fn test_shift_law_negative() {
    let wf = noise_burst(10_000, 1000, 2000);
    for n in [1usize, 100, 4410] {
        let t = offset(&delayed(&wf, n), &wf).unwrap();
        assert_abs_diff_eq!(t.as_secs(), -(n as f64) / RATE as f64, epsilon = 1e-12);
    }
}

/// Correlator and detector agree on half-second whistles 0.3 s apart
#[test]
fn test_correlation_matches_detection() {
    let cam1 = tone_recording(5.0, 2.0, Some(2.5), 2800.0, 0.8);
    let cam2 = tone_recording(5.0, 2.3, Some(2.8), 2800.0, 0.8);

    let correlation = CrossCorrelator::default().correlate(&cam1, &cam2).unwrap();
    assert_eq!(correlation.lag_samples, 13230);
    assert!(correlation.confidence > 0.5, "confidence {}", correlation.confidence);

    let band = FrequencyBand::default();
    let threshold = DetectionThreshold::default();
    let d1 = whistle_onset(&cam1, band, threshold).unwrap();
    let d2 = whistle_onset(&cam2, band, threshold).unwrap();
    assert_abs_diff_eq!(
        correlation.offset.as_secs(),
        d2.onset.as_secs() - d1.onset.as_secs(),
        epsilon = 1.0 / RATE as f64
    );
}

/// A correlation offset alone yields cuts that line both streams up
#[test]
fn test_offset_to_aligned_trims() {
    let cam1 = tone_recording(5.0, 2.0, Some(2.5), 2800.0, 0.8);
    let cam2 = tone_recording(5.0, 2.3, Some(2.8), 2800.0, 0.8);
    let offset = CrossCorrelator::default().offset(&cam1, &cam2).unwrap();

    let trims = align("cam1", "cam2", offset).unwrap();
    assert_eq!(trims["cam1"].start_secs, 0.0);
    assert_abs_diff_eq!(trims["cam2"].start_secs, 0.3, epsilon = 1.0 / RATE as f64);

    // Swapping the inputs cuts the other stream
    let swapped = CrossCorrelator::default().offset(&cam2, &cam1).unwrap();
    let trims = align("cam2", "cam1", swapped).unwrap();
    assert_abs_diff_eq!(trims["cam2"].start_secs, 0.3, epsilon = 1.0 / RATE as f64);
    assert_eq!(trims["cam1"].start_secs, 0.0);
}

/// Different sample rates are rejected before any work
#[test]
fn test_rate_mismatch_rejected() {
    let a = Waveform::new(vec![0.1; 100], 44100).unwrap();
    let b = Waveform::new(vec![0.1; 100], 48000).unwrap();
    assert!(matches!(
        offset(&a, &b),
        Err(SyncError::SampleRateMismatch { a: 44100, b: 48000 })
    ));
}

/// Length cap and timeout bound the work
#[test]
fn test_limits_enforced() {
    let wf = noise_burst(RATE as usize * 2, 0, 1000);
    let capped = CrossCorrelator::with_limits(CorrelationLimits {
        max_duration_secs: Some(1.0),
        timeout_secs: None,
    });
    assert!(matches!(
        capped.correlate(&wf, &wf),
        Err(SyncError::WaveformTooLong { .. })
    ));

    let generous = CrossCorrelator::with_limits(CorrelationLimits::unbounded());
    let c = generous
        .correlate_with_timeout(wf.clone(), delayed(&wf, 50), Duration::from_secs(30))
        .unwrap();
    assert_eq!(c.lag_samples, 50);

    let long = noise_burst(1 << 20, 0, 1 << 20);
    let impatient = CrossCorrelator::with_limits(CorrelationLimits {
        max_duration_secs: None,
        timeout_secs: Some(1e-9),
    });
    assert!(matches!(
        impatient.correlate_bounded(long.clone(), long),
        Err(SyncError::Timeout(_))
    ));
}
