//! FFT-based cross-correlation offset estimation
//!
//! Estimates the relative start offset of two whole recordings without
//! looking for a specific event. Both waveforms are zero-padded to a common
//! length `n`, `a` is convolved with the time-reversed `b` in the frequency
//! domain, and the centred `n` samples of the result ("same" mode) are
//! searched for their maximum.
//!
//! ## Sign convention
//!
//! `lag = n / 2 - argmax`. A positive lag means the shared content occurs
//! *later* in `b` than in `a`: if `b` is `a` delayed by `d` samples, the
//! lag is `+d`. Lags are recoverable up to about half the padded length.

use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::TimeOffset;
use super::waveform::Waveform;
use crate::error::{Result, SyncError};

/// Default cap on input length (10 minutes)
const DEFAULT_MAX_DURATION_SECS: f64 = 600.0;

/// Bounds on a single correlation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationLimits {
    /// Reject inputs longer than this many seconds (None = unbounded)
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: Option<f64>,
    /// Give up waiting after this many seconds (None = wait forever)
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

fn default_max_duration() -> Option<f64> {
    Some(DEFAULT_MAX_DURATION_SECS)
}

impl Default for CorrelationLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration(),
            timeout_secs: None,
        }
    }
}

impl CorrelationLimits {
    /// No length cap and no timeout
    pub fn unbounded() -> Self {
        Self {
            max_duration_secs: None,
            timeout_secs: None,
        }
    }
}

/// Result of correlating two waveforms
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    /// Lag in samples (positive: `b` lags `a`)
    pub lag_samples: i64,
    /// Lag converted to seconds
    pub offset: TimeOffset,
    /// Raw correlation value at the peak
    pub peak: f64,
    /// Peak normalized by the geometric mean of the input energies (0.0 to 1.0)
    pub confidence: f32,
    /// Length of the "same" mode correlation sequence
    pub length: usize,
}

/// Whole-stream offset estimator
///
/// Stateless: every call plans its own FFTs, so one correlator can be
/// shared freely across threads.
///
/// # Example
/// ```
/// use whistlesync_core::{CrossCorrelator, Waveform};
///
/// let mut a = vec![0.0f32; 1000];
/// a[100] = 1.0;
/// let mut b = vec![0.0f32; 1000];
/// b[150] = 1.0;
///
/// let a = Waveform::new(a, 1000).unwrap();
/// let b = Waveform::new(b, 1000).unwrap();
/// let offset = CrossCorrelator::default().offset(&a, &b).unwrap();
/// assert!((offset.as_secs() - 0.05).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossCorrelator {
    limits: CorrelationLimits,
}

impl CrossCorrelator {
    /// Create a correlator with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a correlator with explicit limits
    pub fn with_limits(limits: CorrelationLimits) -> Self {
        Self { limits }
    }

    /// Configured limits
    pub fn limits(&self) -> CorrelationLimits {
        self.limits
    }

    /// Correlate `a` against `b`
    ///
    /// # Errors
    /// - [`SyncError::SampleRateMismatch`] if the rates differ
    /// - [`SyncError::EmptyWaveform`] if either input is empty
    /// - [`SyncError::WaveformTooLong`] if an input exceeds the length cap
    pub fn correlate(&self, a: &Waveform, b: &Waveform) -> Result<Correlation> {
        self.validate(a, b)?;
        let started = Instant::now();

        let n = a.len().max(b.len());
        let full_len = 2 * n - 1;
        let fft_size = full_len.next_power_of_two();
        let zero = Complex::new(0.0f64, 0.0);

        let mut spec_a: Vec<Complex<f64>> = a
            .samples()
            .iter()
            .map(|&x| Complex::new(x as f64, 0.0))
            .chain(std::iter::repeat(zero))
            .take(fft_size)
            .collect();

        // Reverse of `b` after padding it to `n`: the padding comes first
        let mut spec_b: Vec<Complex<f64>> = std::iter::repeat(zero)
            .take(n - b.len())
            .chain(b.samples().iter().rev().map(|&x| Complex::new(x as f64, 0.0)))
            .chain(std::iter::repeat(zero))
            .take(fft_size)
            .collect();

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        fft.process(&mut spec_a);
        fft.process(&mut spec_b);

        for (x, y) in spec_a.iter_mut().zip(&spec_b) {
            *x *= *y;
        }

        let ifft = planner.plan_fft_inverse(fft_size);
        ifft.process(&mut spec_a);

        // Centre `n` samples of the full linear convolution
        let start = (full_len - n) / 2;
        let norm = 1.0 / fft_size as f64;
        let mut peak = f64::NEG_INFINITY;
        let mut peak_idx = 0;
        for (i, c) in spec_a[start..start + n].iter().enumerate() {
            let val = c.re * norm;
            // Strict comparison keeps the first maximum
            if val > peak {
                peak = val;
                peak_idx = i;
            }
        }

        let lag_samples = (n / 2) as i64 - peak_idx as i64;
        let offset = TimeOffset::from_samples(lag_samples, a.sample_rate());

        let energy_a: f64 = a.samples().iter().map(|&x| (x as f64) * (x as f64)).sum();
        let energy_b: f64 = b.samples().iter().map(|&x| (x as f64) * (x as f64)).sum();
        let denom = (energy_a * energy_b).sqrt();
        let confidence = if denom > 1e-12 {
            (peak / denom).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };

        debug!(
            n,
            fft_size,
            lag_samples,
            confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cross-correlation complete"
        );

        Ok(Correlation {
            lag_samples,
            offset,
            peak,
            confidence,
            length: n,
        })
    }

    /// Signed offset in seconds (positive: `b` lags `a`)
    pub fn offset(&self, a: &Waveform, b: &Waveform) -> Result<TimeOffset> {
        self.correlate(a, b).map(|c| c.offset)
    }

    /// Correlate on a worker thread, giving up after `timeout`
    ///
    /// Inputs are validated up front. On timeout the worker is detached and
    /// its result discarded when it finishes.
    ///
    /// # Errors
    /// Everything [`Self::correlate`] returns, plus [`SyncError::Timeout`].
    pub fn correlate_with_timeout(
        &self,
        a: Waveform,
        b: Waveform,
        timeout: Duration,
    ) -> Result<Correlation> {
        self.validate(&a, &b)?;

        let (tx, rx) = crossbeam_channel::bounded(1);
        let correlator = *self;
        std::thread::Builder::new()
            .name("correlation".into())
            .spawn(move || {
                // Receiver may already be gone after a timeout
                let _ = tx.send(correlator.correlate(&a, &b));
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SyncError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SyncError::Io(std::io::Error::other(
                "correlation worker exited without a result",
            ))),
        }
    }

    /// Correlate, honouring `timeout_secs` from the limits if set
    pub fn correlate_bounded(&self, a: Waveform, b: Waveform) -> Result<Correlation> {
        match self.limits.timeout_secs {
            Some(secs) => self.correlate_with_timeout(a, b, Duration::from_secs_f64(secs.max(0.0))),
            None => self.correlate(&a, &b),
        }
    }

    fn validate(&self, a: &Waveform, b: &Waveform) -> Result<()> {
        if a.sample_rate() != b.sample_rate() {
            return Err(SyncError::SampleRateMismatch {
                a: a.sample_rate(),
                b: b.sample_rate(),
            });
        }
        if a.is_empty() || b.is_empty() {
            return Err(SyncError::EmptyWaveform);
        }
        if let Some(limit) = self.limits.max_duration_secs {
            let longest = a.duration_secs().max(b.duration_secs());
            if longest > limit {
                return Err(SyncError::WaveformTooLong {
                    duration_secs: longest,
                    limit_secs: limit,
                });
            }
        }
        Ok(())
    }
}

/// Signed offset between `a` and `b` with default limits
pub fn offset(a: &Waveform, b: &Waveform) -> Result<TimeOffset> {
    CrossCorrelator::default().offset(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic noise burst in the middle of silence
    fn burst(len: usize, at: usize, burst_len: usize, sample_rate: u32) -> Waveform {
        let mut seed: u32 = 0xDEADBEEF;
        let mut samples = vec![0.0f32; len];
        for s in samples.iter_mut().skip(at).take(burst_len) {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let bits = (seed >> 16) & 0x7FFF;
            *s = (bits as f32 / 16384.0) - 1.0;
        }
        Waveform::new(samples, sample_rate).unwrap()
    }

    fn shifted(wf: &Waveform, n: usize) -> Waveform {
        let mut samples = vec![0.0f32; n];
        samples.extend_from_slice(wf.samples());
        Waveform::new(samples, wf.sample_rate()).unwrap()
    }

    #[test]
    fn test_self_correlation_is_zero() {
        for len in [999, 1000, 4410] {
            let wf = burst(len, len / 3, 200, 44100);
            let c = CrossCorrelator::default().correlate(&wf, &wf).unwrap();
            assert_eq!(c.lag_samples, 0, "Length {}", len);
            assert!(c.confidence > 0.99, "Self-correlation confidence {}", c.confidence);
        }
    }

    #[test]
    fn test_shift_positive_when_b_lags() {
        let wf = burst(8000, 1000, 500, 8000);
        let later = shifted(&wf, 123);
        let c = CrossCorrelator::default().correlate(&wf, &later).unwrap();
        assert_eq!(c.lag_samples, 123);
        assert_eq!(c.length, 8123);
    }

    #[test]
    fn test_shift_negative_when_a_lags() {
        let wf = burst(8000, 1000, 500, 8000);
        let later = shifted(&wf, 123);
        let c = CrossCorrelator::default().correlate(&later, &wf).unwrap();
        assert_eq!(c.lag_samples, -123);
    }

    #[test]
    fn test_sample_rate_mismatch() {
        let a = burst(100, 10, 10, 44100);
        let b = burst(100, 10, 10, 48000);
        let result = offset(&a, &b);
        assert!(matches!(
            result,
            Err(SyncError::SampleRateMismatch { a: 44100, b: 48000 })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        let a = burst(100, 10, 10, 44100);
        let empty = Waveform::new(Vec::new(), 44100).unwrap();
        assert!(matches!(offset(&a, &empty), Err(SyncError::EmptyWaveform)));
        assert!(matches!(offset(&empty, &a), Err(SyncError::EmptyWaveform)));
    }

    #[test]
    fn test_length_limit() {
        let limits = CorrelationLimits {
            max_duration_secs: Some(0.5),
            timeout_secs: None,
        };
        let a = burst(1000, 10, 10, 1000);
        let result = CrossCorrelator::with_limits(limits).offset(&a, &a);
        assert!(matches!(result, Err(SyncError::WaveformTooLong { .. })));
    }

    #[test]
    fn test_silent_inputs_have_zero_confidence() {
        let a = Waveform::new(vec![0.0; 256], 1000).unwrap();
        let c = CrossCorrelator::default().correlate(&a, &a).unwrap();
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_with_timeout_returns_result() {
        let wf = burst(4000, 500, 300, 8000);
        let later = shifted(&wf, 40);
        let c = CrossCorrelator::default()
            .correlate_with_timeout(wf, later, Duration::from_secs(30))
            .unwrap();
        assert_eq!(c.lag_samples, 40);
    }

    #[test]
    fn test_timeout_expires() {
        // About 24 s at 44.1 kHz: far more than a nanosecond of FFT work
        let wf = burst(1 << 20, 0, 1 << 20, 44100);
        let correlator = CrossCorrelator::with_limits(CorrelationLimits::unbounded());
        let result = correlator.correlate_with_timeout(wf.clone(), wf, Duration::from_nanos(1));
        match result {
            Err(SyncError::Timeout(limit)) => assert_eq!(limit, Duration::from_nanos(1)),
            other => panic!("Expected Timeout, got {:?}", other.map(|c| c.lag_samples)),
        }
    }

    #[test]
    fn test_bounded_honours_timeout_limit() {
        let wf = burst(1 << 20, 0, 1 << 20, 44100);
        let tight = CrossCorrelator::with_limits(CorrelationLimits {
            max_duration_secs: None,
            timeout_secs: Some(1e-9),
        });
        let result = tight.correlate_bounded(wf.clone(), wf);
        assert!(
            matches!(result, Err(SyncError::Timeout(_))),
            "Expected Timeout, got {:?}",
            result.map(|c| c.lag_samples)
        );

        let small = burst(4000, 500, 300, 8000);
        let generous = CrossCorrelator::with_limits(CorrelationLimits {
            max_duration_secs: None,
            timeout_secs: Some(30.0),
        });
        let c = generous.correlate_bounded(small.clone(), shifted(&small, 25)).unwrap();
        assert_eq!(c.lag_samples, 25);
    }

    #[test]
    fn test_default_limits() {
        let limits = CorrelationLimits::default();
        assert_eq!(limits.max_duration_secs, Some(600.0));
        assert_eq!(limits.timeout_secs, None);
    }
}
