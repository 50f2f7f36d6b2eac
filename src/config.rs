//! Persistent configuration
//!
//! Stores the whistle band, detection threshold, pre-roll and decoding
//! settings in a JSON file at `<config_dir>/whistlesync/config.json`.
//! Every field has a default, so partial files are fine.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use whistlesync_core::media::FfmpegCommand;
use whistlesync_core::sync::session::SessionOptions;
use whistlesync_core::{CorrelationLimits, DetectionThreshold, FrequencyBand, PreRollPolicy};

fn default_band() -> FrequencyBand {
    FrequencyBand::default()
}

fn default_threshold() -> f32 {
    whistlesync_core::DEFAULT_THRESHOLD
}

fn default_pre_roll() -> f64 {
    whistlesync_core::DEFAULT_PRE_ROLL_SECS
}

fn default_sample_rate() -> u32 {
    whistlesync_core::DEFAULT_SAMPLE_RATE
}

fn default_frame_rate() -> f64 {
    whistlesync_core::DEFAULT_FRAME_RATE
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

/// Persistent sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whistle pass-band in Hz
    #[serde(default = "default_band")]
    pub band: FrequencyBand,
    /// Detection threshold on normalized, filtered amplitude
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Lead-in kept before the whistle, in seconds
    #[serde(default = "default_pre_roll")]
    pub pre_roll_secs: f64,
    /// Clamp to zero or fail when the lead-in is short
    #[serde(default)]
    pub pre_roll_policy: PreRollPolicy,
    /// Sample rate audio is decoded at
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Frames per second when bursting clips
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Bounds on whole-stream correlation
    #[serde(default)]
    pub correlation: CorrelationLimits,
    /// ffmpeg executable
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            band: default_band(),
            threshold: default_threshold(),
            pre_roll_secs: default_pre_roll(),
            pre_roll_policy: PreRollPolicy::default(),
            sample_rate: default_sample_rate(),
            frame_rate: default_frame_rate(),
            correlation: CorrelationLimits::default(),
            ffmpeg: default_ffmpeg(),
        }
    }
}

impl SyncConfig {
    /// Config file path: `<config_dir>/whistlesync/config.json`
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("whistlesync")
            .join("config.json")
    }

    /// Load config from the default path, falling back to defaults on any error
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Check every value and build the session options
    pub fn session_options(
        &self,
        output_dir: PathBuf,
        burst_frames: bool,
        keep_clips: bool,
    ) -> anyhow::Result<SessionOptions> {
        self.band
            .normalized(self.sample_rate)
            .context("Configured band does not fit the decode sample rate")?;
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            anyhow::bail!("Frame rate must be positive, got {}", self.frame_rate);
        }
        Ok(SessionOptions {
            band: self.band,
            threshold: self.detection_threshold()?,
            pre_roll_secs: self.pre_roll_secs,
            policy: self.pre_roll_policy,
            frame_rate: self.frame_rate,
            output_dir,
            burst_frames,
            keep_clips,
        })
    }

    /// Validated detection threshold
    pub fn detection_threshold(&self) -> anyhow::Result<DetectionThreshold> {
        Ok(DetectionThreshold::new(self.threshold)?)
    }

    /// ffmpeg invocation for this config
    pub fn ffmpeg_command(&self, verbose: bool) -> FfmpegCommand {
        FfmpegCommand::with_program(self.ffmpeg.clone()).verbose(verbose)
    }
}
