//! Audio decoding into normalized mono waveforms
//!
//! [`FfmpegSource`] asks ffmpeg for mono little-endian f32 PCM on stdout,
//! which covers any container ffmpeg understands. [`WavSource`] reads WAV
//! files directly with `hound`, which needs no external tool.

use std::ffi::OsString;
use std::path::Path;

use tracing::info;

use super::ffmpeg::FfmpegCommand;
use super::WaveformSource;
use crate::audio::waveform::Waveform;
use crate::error::{Result, SyncError};

fn extraction_failed(path: &Path, message: impl Into<String>) -> SyncError {
    SyncError::AudioExtractionFailed {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Build the ffmpeg arguments for mono f32 extraction at `sample_rate`
pub fn extraction_args(input: &Path, sample_rate: u32) -> Vec<OsString> {
    vec![
        "-nostdin".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
        "-vn".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        sample_rate.to_string().into(),
        "-f".into(),
        "f32le".into(),
        "-acodec".into(),
        "pcm_f32le".into(),
        "pipe:1".into(),
    ]
}

/// Decode little-endian f32 PCM bytes
fn decode_f32le(bytes: &[u8]) -> std::result::Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "ffmpeg output length {} is not a multiple of 4 bytes",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Decodes any ffmpeg-readable container
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    ffmpeg: FfmpegCommand,
    sample_rate: u32,
}

impl FfmpegSource {
    /// Decode at `sample_rate` with the given ffmpeg invocation
    pub fn new(ffmpeg: FfmpegCommand, sample_rate: u32) -> Self {
        Self {
            ffmpeg,
            sample_rate,
        }
    }

    /// Target sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new(FfmpegCommand::default(), crate::DEFAULT_SAMPLE_RATE)
    }
}

impl WaveformSource for FfmpegSource {
    fn load(&self, path: &Path) -> Result<Waveform> {
        if self.sample_rate == 0 {
            return Err(extraction_failed(path, "decode sample rate must be positive"));
        }
        info!(path = %path.display(), sample_rate = self.sample_rate, "Extracting audio");
        let bytes = self
            .ffmpeg
            .run(&extraction_args(path, self.sample_rate), true)
            .map_err(|m| extraction_failed(path, m))?;
        let samples = decode_f32le(&bytes).map_err(|m| extraction_failed(path, m))?;
        let waveform =
            Waveform::new(samples, self.sample_rate).map_err(|e| extraction_failed(path, e.to_string()))?;
        info!(
            path = %path.display(),
            duration_secs = waveform.duration_secs(),
            "Audio extracted"
        );
        Ok(waveform)
    }
}

/// Reads WAV files, averaging channels down to mono
#[derive(Debug, Clone, Copy, Default)]
pub struct WavSource;

impl WaveformSource for WavSource {
    fn load(&self, path: &Path) -> Result<Waveform> {
        let mut reader = hound::WavReader::open(path).map_err(|e| extraction_failed(path, e.to_string()))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| extraction_failed(path, e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| extraction_failed(path, e.to_string()))?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        info!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels,
            "Read WAV file"
        );
        Waveform::new(samples, spec.sample_rate).map_err(|e| extraction_failed(path, e.to_string()))
    }
}

/// Picks [`WavSource`] for `.wav` files and [`FfmpegSource`] otherwise
#[derive(Debug, Clone, Default)]
pub struct AutoSource {
    ffmpeg: FfmpegSource,
}

impl AutoSource {
    /// Fall back to `ffmpeg` for non-WAV inputs
    pub fn new(ffmpeg: FfmpegSource) -> Self {
        Self { ffmpeg }
    }

    fn is_wav(path: &Path) -> bool {
        path.extension()
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false)
    }
}

impl WaveformSource for AutoSource {
    fn load(&self, path: &Path) -> Result<Waveform> {
        if Self::is_wav(path) {
            WavSource.load(path)
        } else {
            self.ffmpeg.load(path)
        }
    }
}

/// Name used for a stream when none is given: the file stem
pub fn stream_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
