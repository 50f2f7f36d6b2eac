//! Error type shared by every stage of the sync pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the sync pipeline
///
/// Every variant is terminal for the call that produced it. The numeric
/// stages are deterministic, so nothing here is worth retrying.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid frequency band {low_hz}-{high_hz} Hz for sample rate {sample_rate} Hz")]
    InvalidBand {
        low_hz: f64,
        high_hz: f64,
        sample_rate: u32,
    },

    #[error("Invalid detection threshold {0}: must be a positive finite amplitude")]
    InvalidThreshold(f32),

    #[error("Invalid pre-roll {0}s: must be a non-negative finite number of seconds")]
    InvalidPreRoll(f64),

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("No sample exceeds threshold {threshold} in {duration_secs:.2}s of audio")]
    EventNotFound { threshold: f32, duration_secs: f64 },

    #[error("Waveform contains no samples")]
    EmptyWaveform,

    #[error("Sample rate mismatch: {a} Hz vs {b} Hz")]
    SampleRateMismatch { a: u32, b: u32 },

    #[error("Waveform too long for correlation: {duration_secs:.1}s exceeds limit of {limit_secs:.1}s")]
    WaveformTooLong { duration_secs: f64, limit_secs: f64 },

    #[error("Correlation did not finish within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Event at {detection_secs:.3}s in '{stream}' leaves less than the requested {pre_roll_secs}s pre-roll")]
    InsufficientPreRoll {
        stream: String,
        detection_secs: f64,
        pre_roll_secs: f64,
    },

    #[error("Stream '{0}' appears more than once")]
    DuplicateStream(String),

    #[error("Audio extraction failed for {path}: {message}")]
    AudioExtractionFailed { path: PathBuf, message: String },

    #[error("Clip trim failed for {path}: {message}")]
    ClipTrimFailed { path: PathBuf, message: String },

    #[error("Frame burst failed for {path}: {message}")]
    FrameBurstFailed { path: PathBuf, message: String },

    #[error("Output location already exists: {0} (remove it first)")]
    OutputExists(PathBuf),

    #[error("Stream '{stream}': {source}")]
    Stream {
        stream: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Attach the stream label to an error raised while processing that stream
    pub fn for_stream(self, stream: impl Into<String>) -> Self {
        match self {
            // Never nest labels
            SyncError::Stream { .. } => self,
            other => SyncError::Stream {
                stream: stream.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, with any stream label stripped
    pub fn kind(&self) -> &SyncError {
        match self {
            SyncError::Stream { source, .. } => source.kind(),
            other => other,
        }
    }
}
