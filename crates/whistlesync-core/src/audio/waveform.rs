//! Decoded, normalized audio buffers

use crate::error::{Result, SyncError};

/// Full scale of signed 16-bit PCM, used to normalize to [-1, 1)
const I16_FULL_SCALE: f32 = 32768.0;

/// A single-channel block of normalized samples with its sample rate
///
/// Samples are expected in roughly [-1, 1]. A waveform is immutable once
/// built: stages that transform it produce a new one.
///
/// # Example
/// ```
/// use whistlesync_core::Waveform;
///
/// let wf = Waveform::new(vec![0.0; 44100], 44100).unwrap();
/// assert_eq!(wf.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Create a waveform from normalized samples
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidSampleRate`] if `sample_rate` is zero.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SyncError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a waveform from signed 16-bit PCM, dividing by 2^15
    pub fn from_pcm_i16(pcm: &[i16], sample_rate: u32) -> Result<Self> {
        let samples = pcm.iter().map(|&s| s as f32 / I16_FULL_SCALE).collect();
        Self::new(samples, sample_rate)
    }

    /// Build a waveform at the same sample rate with different samples
    pub(crate) fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// Sample data
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the waveform holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value (0.0 when empty)
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Consume the waveform, returning the raw samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
