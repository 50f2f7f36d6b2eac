//! Whistlesync Core - whistle detection, offset estimation and trim planning
//!
//! This library finds a shared whistle in two independently recorded
//! streams and turns its position into trim instructions, so that both
//! recordings can be cut to start at the same moment and burst into
//! time-aligned frames.
//!
//! - [`audio`]: waveform types, band-pass filter, onset detector, cross-correlator
//! - [`sync`]: trim planning and end-to-end session orchestration
//! - [`media`]: ffmpeg/WAV adapters for decoding, trimming and frame bursting

pub mod audio;
pub mod error;
pub mod media;
pub mod sync;

pub use audio::correlation::{CorrelationLimits, CrossCorrelator};
pub use audio::detector::EventDetector;
pub use audio::filter::BandpassFilter;
pub use audio::types::{DetectionThreshold, FrequencyBand, TimeOffset};
pub use audio::waveform::Waveform;
pub use error::{Result, SyncError};
pub use sync::planner::{PreRollPolicy, SyncPlanner, TrimInstruction};
pub use sync::session::{SessionReport, SyncSession};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default decode sample rate (CD quality, what most cameras record at)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Lower edge of the default whistle band in Hz
pub const DEFAULT_BAND_LOW_HZ: f64 = 2775.0;

/// Upper edge of the default whistle band in Hz
pub const DEFAULT_BAND_HIGH_HZ: f64 = 2850.0;

/// Default detection threshold on normalized, filtered amplitude
pub const DEFAULT_THRESHOLD: f32 = 0.4;

/// Default lead-in kept before the whistle, in seconds
pub const DEFAULT_PRE_ROLL_SECS: f64 = 1.0;

/// Default frame rate for bursting clips into stills
pub const DEFAULT_FRAME_RATE: f64 = 5.0;
