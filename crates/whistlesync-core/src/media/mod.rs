//! Media boundary: decoding, trimming and frame bursting
//!
//! Everything here shells out to `ffmpeg` (or reads WAV directly) and is
//! kept behind traits so the sync session can be driven by fakes in tests:
//! - [`WaveformSource`]: media file to mono normalized [`Waveform`] ([`source`])
//! - [`ClipTrimmer`]: cut a file at a start time without re-encoding ([`trimmer`])
//! - [`FrameBurster`]: split a clip into numbered stills ([`burster`])

pub mod burster;
pub mod ffmpeg;
pub mod source;
pub mod trimmer;

use std::path::{Path, PathBuf};

use crate::audio::waveform::Waveform;
use crate::error::Result;
use crate::sync::planner::TrimInstruction;

pub use burster::FfmpegBurster;
pub use ffmpeg::FfmpegCommand;
pub use source::{AutoSource, FfmpegSource, WavSource};
pub use trimmer::FfmpegTrimmer;

/// Decodes a media file's audio into a single-channel waveform
pub trait WaveformSource: Send + Sync {
    /// Load and decode the audio track of `path`
    ///
    /// Failures are reported as [`crate::SyncError::AudioExtractionFailed`].
    fn load(&self, path: &Path) -> Result<Waveform>;
}

/// Produces a copy of a media file starting at a given time
pub trait ClipTrimmer: Send + Sync {
    /// Where the clip for `stream` would be written
    fn clip_path(&self, input: &Path, stream: &str, out_dir: &Path) -> PathBuf {
        trimmer::cut_path(input, stream, out_dir)
    }

    /// Write a trimmed copy of `input` into `out_dir`, returning its path
    ///
    /// Must not overwrite an existing file at [`Self::clip_path`].
    fn trim(&self, input: &Path, instruction: &TrimInstruction, out_dir: &Path) -> Result<PathBuf>;
}

/// Splits a clip into a numbered sequence of still images
pub trait FrameBurster: Send + Sync {
    /// Extract frames of `clip` at `frame_rate` into `folder`, returning it
    fn burst(&self, clip: &Path, frame_rate: f64, folder: &Path) -> Result<PathBuf>;
}
