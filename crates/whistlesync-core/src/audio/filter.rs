//! Butterworth band-pass filter for isolating the whistle
//!
//! Designs a fixed 3rd-order Butterworth band-pass (six poles) from the
//! analog prototype and runs it causally as a cascade of second-order
//! sections. Only the onset time of the filtered signal matters downstream,
//! so there is no zero-phase pass.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use tracing::debug;

use super::types::FrequencyBand;
use super::waveform::Waveform;
use crate::error::Result;

/// Order of the low-pass prototype
const ORDER: usize = 3;

/// Bilinear transform constant `2 * fs` with the sample rate normalized to 1
const BILINEAR_K: f64 = 2.0;

/// Imaginary parts below this are treated as real poles
const REAL_POLE_EPSILON: f64 = 1e-12;

/// One second-order section, `a[0]` implied to be 1
#[derive(Debug, Clone, Copy, PartialEq)]
struct Biquad {
    b: [f64; 3],
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// Band-pass section: one zero at DC, one at Nyquist, poles `p` and `q`
    ///
    /// `p` and `q` must either be a conjugate pair or both real, so the
    /// denominator has real coefficients.
    fn bandpass(p: Complex<f64>, q: Complex<f64>) -> Self {
        Self {
            b: [1.0, 0.0, -1.0],
            a1: -(p + q).re,
            a2: (p * q).re,
        }
    }

    /// Complex response at `z^-1 = zinv`
    fn response(&self, zinv: Complex<f64>) -> Complex<f64> {
        let num = self.b[0] + self.b[1] * zinv + self.b[2] * zinv * zinv;
        let den = 1.0 + self.a1 * zinv + self.a2 * zinv * zinv;
        num / den
    }
}

/// A designed band-pass filter bound to one sample rate
///
/// # Example
/// ```
/// use whistlesync_core::{BandpassFilter, FrequencyBand};
///
/// let filter = BandpassFilter::design(FrequencyBand::default(), 44100).unwrap();
/// let out = filter.apply(&[0.0; 128]);
/// assert_eq!(out.len(), 128);
/// ```
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    band: FrequencyBand,
    sample_rate: u32,
    sections: Vec<Biquad>,
}

impl BandpassFilter {
    /// Design the filter for `band` at `sample_rate`
    ///
    /// # Errors
    /// [`crate::SyncError::InvalidBand`] if the band does not satisfy
    /// `0 < low < high < nyquist`.
    pub fn design(band: FrequencyBand, sample_rate: u32) -> Result<Self> {
        let (low, high) = band.normalized(sample_rate)?;

        // Pre-warp the edges so they land exactly after the bilinear transform
        let w_low = BILINEAR_K * (PI * low / 2.0).tan();
        let w_high = BILINEAR_K * (PI * high / 2.0).tan();
        let bandwidth = w_high - w_low;
        let w_center = (w_low * w_high).sqrt();

        let mut sections = Vec::with_capacity(ORDER);
        for k in 0..ORDER {
            let theta = PI * (2 * k + ORDER + 1) as f64 / (2 * ORDER) as f64;
            let proto = Complex::from_polar(1.0, theta);
            if proto.im < -REAL_POLE_EPSILON {
                // Conjugate of a pole already handled
                continue;
            }

            // Low-pass to band-pass: each prototype pole splits in two
            let half = proto * (bandwidth / 2.0);
            let root = (half * half - w_center * w_center).sqrt();
            let upper = to_digital(half + root);
            let lower = to_digital(half - root);

            if proto.im.abs() <= REAL_POLE_EPSILON {
                sections.push(Biquad::bandpass(upper, lower));
            } else {
                sections.push(Biquad::bandpass(upper, upper.conj()));
                sections.push(Biquad::bandpass(lower, lower.conj()));
            }
        }

        // Unity gain at the (warped) geometric centre of the band
        let center_rad = 2.0 * (w_center / BILINEAR_K).atan();
        let zinv = Complex::from_polar(1.0, -center_rad);
        let magnitude = sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(zinv))
            .norm();
        if let Some(first) = sections.first_mut() {
            for b in &mut first.b {
                *b /= magnitude;
            }
        }

        debug!(
            low_hz = band.low_hz,
            high_hz = band.high_hz,
            sample_rate,
            sections = sections.len(),
            "Designed band-pass filter"
        );

        Ok(Self {
            band,
            sample_rate,
            sections,
        })
    }

    /// Run the filter over `input`, starting from rest
    pub fn apply(&self, input: &[f32]) -> Vec<f32> {
        let mut state = vec![[0.0f64; 2]; self.sections.len()];
        input
            .iter()
            .map(|&x| {
                let mut v = x as f64;
                for (s, z) in self.sections.iter().zip(state.iter_mut()) {
                    // Transposed direct form II
                    let y = s.b[0] * v + z[0];
                    z[0] = s.b[1] * v - s.a1 * y + z[1];
                    z[1] = s.b[2] * v - s.a2 * y;
                    v = y;
                }
                v as f32
            })
            .collect()
    }

    /// Magnitude response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sample_rate as f64;
        let zinv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(zinv))
            .norm()
    }

    /// The band this filter passes
    pub fn band(&self) -> FrequencyBand {
        self.band
    }

    /// Sample rate the filter was designed for
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Largest pole radius; below 1.0 means the filter is stable
    pub fn max_pole_radius(&self) -> f64 {
        self.sections
            .iter()
            .map(|s| {
                // Poles of z^2 + a1 z + a2
                let disc = Complex::new(s.a1 * s.a1 - 4.0 * s.a2, 0.0).sqrt();
                let p = (-s.a1 + disc) / 2.0;
                let q = (-s.a1 - disc) / 2.0;
                p.norm().max(q.norm())
            })
            .fold(0.0, f64::max)
    }
}

/// Bilinear map from the s-plane to the z-plane
fn to_digital(s: Complex<f64>) -> Complex<f64> {
    (BILINEAR_K + s) / (BILINEAR_K - s)
}

/// Band-pass `waveform`, returning a waveform of the same length and rate
///
/// # Errors
/// [`crate::SyncError::InvalidBand`] if `band` is invalid at the
/// waveform's sample rate.
pub fn filter(waveform: &Waveform, band: FrequencyBand) -> Result<Waveform> {
    let designed = BandpassFilter::design(band, waveform.sample_rate())?;
    Ok(waveform.with_samples(designed.apply(waveform.samples())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn tone(freq_hz: f64, amplitude: f32, secs: f64, sample_rate: u32) -> Waveform {
        let n = (secs * sample_rate as f64) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                amplitude * (2.0 * PI * freq_hz * t).sin() as f32
            })
            .collect();
        Waveform::new(samples, sample_rate).unwrap()
    }

    /// Peak after the start-up transient has died away
    fn steady_peak(wf: &Waveform) -> f32 {
        let skip = wf.sample_rate() as usize / 4;
        wf.samples()
            .iter()
            .skip(skip)
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_three_sections_for_third_order() {
        let f = BandpassFilter::design(FrequencyBand::default(), 44100).unwrap();
        assert_eq!(f.sections.len(), 3);
    }

    #[test]
    fn test_filter_is_stable() {
        for rate in [8000, 44100, 48000, 96000] {
            let f = BandpassFilter::design(FrequencyBand::default(), rate).unwrap();
            let r = f.max_pole_radius();
            assert!(r < 1.0, "Pole radius {} at {} Hz should be < 1", r, rate);
        }
    }

    #[test]
    fn test_wide_band_is_stable() {
        // Wide enough that the real prototype pole maps to two real poles
        let f = BandpassFilter::design(FrequencyBand::new(50.0, 20000.0), 44100).unwrap();
        assert!(f.max_pole_radius() < 1.0);
        assert!((f.magnitude_at(1000.0) - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_unity_gain_in_band() {
        let f = BandpassFilter::design(FrequencyBand::default(), 44100).unwrap();
        let center = (2775.0f64 * 2850.0).sqrt();
        assert!((f.magnitude_at(center) - 1.0).abs() < 1e-3);
        // Butterworth edges are -3 dB
        let edge = f.magnitude_at(2775.0);
        assert!((edge - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01, "Edge gain {}", edge);
    }

    #[test]
    fn test_out_of_band_response_is_small() {
        let f = BandpassFilter::design(FrequencyBand::default(), 44100).unwrap();
        for freq in [100.0, 1000.0, 2500.0, 3200.0, 8000.0] {
            let m = f.magnitude_at(freq);
            assert!(m < 0.01, "{} Hz should be attenuated, got {}", freq, m);
        }
    }

    #[test]
    fn test_length_and_rate_preserved() {
        let wf = tone(440.0, 0.5, 0.1, 48000);
        let out = filter(&wf, FrequencyBand::default()).unwrap();
        assert_eq!(out.len(), wf.len());
        assert_eq!(out.sample_rate(), 48000);
    }

    #[test]
    fn test_empty_input() {
        let wf = Waveform::new(Vec::new(), 44100).unwrap();
        let out = filter(&wf, FrequencyBand::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_silence_stays_silent() {
        let wf = Waveform::new(vec![0.0; 4410], 44100).unwrap();
        let out = filter(&wf, FrequencyBand::default()).unwrap();
        assert!(out.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_tone_attenuation() {
        let center = tone(2812.0, 0.8, 1.0, 44100);
        let center_peak = steady_peak(&filter(&center, FrequencyBand::default()).unwrap());
        assert!(center_peak > 0.7, "Centre tone should pass, got {}", center_peak);

        for freq in [1000.0, 2500.0, 3200.0, 5000.0] {
            let off = tone(freq, 0.8, 1.0, 44100);
            let off_peak = steady_peak(&filter(&off, FrequencyBand::default()).unwrap());
            assert!(
                off_peak * 10.0 < center_peak,
                "{} Hz peak {} should be 10x below centre peak {}",
                freq,
                off_peak,
                center_peak
            );
        }
    }

    #[test]
    fn test_invalid_band() {
        let wf = tone(440.0, 0.5, 0.1, 44100);
        let result = filter(&wf, FrequencyBand::new(3000.0, 2000.0));
        assert!(matches!(result, Err(SyncError::InvalidBand { .. })));
        let result = filter(&wf, FrequencyBand::new(1000.0, 30000.0));
        assert!(matches!(result, Err(SyncError::InvalidBand { .. })));
    }
}
