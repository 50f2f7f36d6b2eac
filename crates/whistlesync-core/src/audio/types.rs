//! Value types shared by the analysis stages

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// A pass-band of interest, in Hz
///
/// Validity depends on the sample rate it is used with, so the band is only
/// checked when it is normalized against one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Lower cutoff in Hz
    pub low_hz: f64,
    /// Upper cutoff in Hz
    pub high_hz: f64,
}

impl FrequencyBand {
    /// Create a band from explicit edges
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Create a band of `width_hz` centred on `center_hz`
    ///
    /// # Example
    /// ```
    /// use whistlesync_core::FrequencyBand;
    ///
    /// let band = FrequencyBand::centered(2800.0, 100.0);
    /// assert_eq!(band.low_hz, 2750.0);
    /// assert_eq!(band.high_hz, 2850.0);
    /// ```
    pub fn centered(center_hz: f64, width_hz: f64) -> Self {
        let half = width_hz / 2.0;
        Self::new(center_hz - half, center_hz + half)
    }

    /// Cutoffs as fractions of Nyquist for the given sample rate
    ///
    /// # Errors
    /// [`SyncError::InvalidBand`] unless `0 < low < high < 1` after
    /// normalization.
    pub fn normalized(&self, sample_rate: u32) -> Result<(f64, f64)> {
        let invalid = || SyncError::InvalidBand {
            low_hz: self.low_hz,
            high_hz: self.high_hz,
            sample_rate,
        };
        if sample_rate == 0 {
            return Err(invalid());
        }
        let nyquist = sample_rate as f64 / 2.0;
        let low = self.low_hz / nyquist;
        let high = self.high_hz / nyquist;

        // Written so NaN edges fail every comparison
        let in_range = |w: f64| w > 0.0 && w < 1.0;
        if !(in_range(low) && in_range(high) && low < high) {
            return Err(invalid());
        }
        Ok((low, high))
    }

    /// Width of the band in Hz
    pub fn width_hz(&self) -> f64 {
        self.high_hz - self.low_hz
    }
}

impl Default for FrequencyBand {
    fn default() -> Self {
        Self::new(crate::DEFAULT_BAND_LOW_HZ, crate::DEFAULT_BAND_HIGH_HZ)
    }
}

/// Amplitude a filtered sample must exceed to count as the event
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct DetectionThreshold(f32);

impl DetectionThreshold {
    /// Create a threshold
    ///
    /// # Errors
    /// [`SyncError::InvalidThreshold`] for zero, negative or non-finite
    /// values; those would trivially match the first sample.
    pub fn new(value: f32) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(SyncError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    /// The raw amplitude
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for DetectionThreshold {
    fn default() -> Self {
        Self(crate::DEFAULT_THRESHOLD)
    }
}

/// A signed time in seconds
///
/// Used both for positions within a stream (onset times) and for the
/// relative offset between two streams.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct TimeOffset(f64);

impl TimeOffset {
    /// Offset of `secs` seconds
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Offset of a (possibly negative) number of samples
    pub fn from_samples(samples: i64, sample_rate: u32) -> Self {
        Self(samples as f64 / sample_rate as f64)
    }

    /// Seconds
    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Milliseconds
    pub fn as_millis(&self) -> f64 {
        self.0 * 1000.0
    }
}

impl std::fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}s", self.0)
    }
}
