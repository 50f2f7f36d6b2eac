//! First-crossing onset detection
//!
//! Finds the first sample of a (usually band-passed) waveform that rises
//! above a fixed amplitude threshold. A whistle has one clean onset, so
//! unlike an envelope follower there is no smoothing, debounce or
//! hysteresis: the first index wins.

use tracing::debug;

use super::filter::BandpassFilter;
use super::types::{DetectionThreshold, FrequencyBand, TimeOffset};
use super::waveform::Waveform;
use crate::error::{Result, SyncError};

/// Detection result from the event detector
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Index of the first sample above threshold
    pub onset_index: usize,
    /// Onset time from the start of the waveform
    pub onset: TimeOffset,
    /// Value of the sample that crossed the threshold
    pub onset_amplitude: f32,
}

/// Threshold-crossing event detector
///
/// # Example
/// ```
/// use whistlesync_core::{DetectionThreshold, EventDetector, Waveform};
///
/// let mut samples = vec![0.0; 100];
/// samples[50] = 0.9;
/// let wf = Waveform::new(samples, 100).unwrap();
///
/// let detector = EventDetector::new(DetectionThreshold::new(0.4).unwrap());
/// let onset = detector.first_crossing(&wf).unwrap();
/// assert_eq!(onset.as_secs(), 0.5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDetector {
    threshold: DetectionThreshold,
}

impl EventDetector {
    /// Create a detector with the given threshold
    pub fn new(threshold: DetectionThreshold) -> Self {
        Self { threshold }
    }

    /// Detection threshold
    pub fn threshold(&self) -> DetectionThreshold {
        self.threshold
    }

    /// Scan `waveform` for the first sample strictly above the threshold
    ///
    /// # Errors
    /// [`SyncError::EventNotFound`] if the waveform is empty or no sample
    /// exceeds the threshold.
    pub fn detect(&self, waveform: &Waveform) -> Result<Detection> {
        let threshold = self.threshold.value();
        let samples = waveform.samples();

        match samples.iter().position(|&s| s > threshold) {
            Some(onset_index) => {
                let onset = TimeOffset::from_samples(onset_index as i64, waveform.sample_rate());
                debug!(onset_index, onset_secs = onset.as_secs(), "Threshold crossed");
                Ok(Detection {
                    onset_index,
                    onset,
                    onset_amplitude: samples[onset_index],
                })
            }
            None => Err(SyncError::EventNotFound {
                threshold,
                duration_secs: waveform.duration_secs(),
            }),
        }
    }

    /// Time of the first threshold crossing
    pub fn first_crossing(&self, waveform: &Waveform) -> Result<TimeOffset> {
        self.detect(waveform).map(|d| d.onset)
    }
}

/// Time of the first sample above `threshold`
pub fn first_crossing(waveform: &Waveform, threshold: DetectionThreshold) -> Result<TimeOffset> {
    EventDetector::new(threshold).first_crossing(waveform)
}

/// Band-pass `waveform` to `band`, then find the first crossing
///
/// This is the per-stream estimator: its result is the whistle onset time
/// within one recording.
pub fn whistle_onset(
    waveform: &Waveform,
    band: FrequencyBand,
    threshold: DetectionThreshold,
) -> Result<Detection> {
    let filter = BandpassFilter::design(band, waveform.sample_rate())?;
    let filtered = waveform.with_samples(filter.apply(waveform.samples()));
    let result = EventDetector::new(threshold).detect(&filtered);
    if let Err(SyncError::EventNotFound { .. }) = &result {
        debug!(
            filtered_peak = filtered.peak(),
            threshold = threshold.value(),
            "No whistle above threshold"
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold(v: f32) -> DetectionThreshold {
        DetectionThreshold::new(v).unwrap()
    }

    #[test]
    fn test_step_detected_at_exact_index() {
        let rate = 44100;
        for k in [0usize, 1, 1000, 44099] {
            let mut samples = vec![0.0f32; 44100];
            for s in samples.iter_mut().skip(k) {
                *s = 0.5;
            }
            let wf = Waveform::new(samples, rate).unwrap();
            let onset = first_crossing(&wf, threshold(0.4)).unwrap();
            assert_eq!(onset.as_secs(), k as f64 / rate as f64, "Step at {}", k);
        }
    }

    #[test]
    fn test_all_zero_not_found() {
        let wf = Waveform::new(vec![0.0; 1000], 44100).unwrap();
        let result = first_crossing(&wf, threshold(0.01));
        assert!(matches!(result, Err(SyncError::EventNotFound { .. })));
    }

    #[test]
    fn test_empty_not_found() {
        let wf = Waveform::new(Vec::new(), 44100).unwrap();
        let result = first_crossing(&wf, threshold(0.4));
        assert!(matches!(result, Err(SyncError::EventNotFound { .. })));
    }

    #[test]
    fn test_equal_to_threshold_does_not_count() {
        let wf = Waveform::new(vec![0.4, 0.4, 0.41], 100).unwrap();
        let d = EventDetector::new(threshold(0.4)).detect(&wf).unwrap();
        assert_eq!(d.onset_index, 2);
        assert_eq!(d.onset_amplitude, 0.41);
    }

    #[test]
    fn test_negative_excursions_ignored() {
        let wf = Waveform::new(vec![-0.9, -0.9, 0.0, 0.6], 4).unwrap();
        let d = EventDetector::new(threshold(0.4)).detect(&wf).unwrap();
        assert_eq!(d.onset_index, 3);
        assert_eq!(d.onset.as_secs(), 0.75);
    }

    #[test]
    fn test_first_of_many_crossings() {
        let mut samples = vec![0.0f32; 1000];
        samples[200] = 0.5;
        samples[300] = 0.9;
        samples[700] = 0.9;
        let wf = Waveform::new(samples, 1000).unwrap();
        let d = EventDetector::new(threshold(0.4)).detect(&wf).unwrap();
        assert_eq!(d.onset_index, 200);
    }

    #[test]
    fn test_whistle_onset_rejects_invalid_band() {
        let wf = Waveform::new(vec![0.0; 100], 4000).unwrap();
        let result = whistle_onset(&wf, FrequencyBand::default(), threshold(0.4));
        assert!(matches!(result, Err(SyncError::InvalidBand { .. })));
    }
}
