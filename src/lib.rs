//! Whistlesync - synchronise two recordings on a shared whistle
//!
//! This library re-exports the detection, correlation and planning engine
//! from `whistlesync-core` and adds the persistent configuration used by
//! the command-line tool.

pub mod config;

pub use whistlesync_core::audio;
pub use whistlesync_core::media;
pub use whistlesync_core::sync;

pub use whistlesync_core::{
    CorrelationLimits, CrossCorrelator, DetectionThreshold, EventDetector, FrequencyBand,
    PreRollPolicy, Result, SyncError, SyncPlanner, SyncSession, TimeOffset, TrimInstruction,
    Waveform,
};
pub use whistlesync_core::{
    DEFAULT_BAND_HIGH_HZ, DEFAULT_BAND_LOW_HZ, DEFAULT_FRAME_RATE, DEFAULT_PRE_ROLL_SECS,
    DEFAULT_SAMPLE_RATE, DEFAULT_THRESHOLD, VERSION,
};
