//! Splitting clips into numbered still frames

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use super::ffmpeg::FfmpegCommand;
use super::FrameBurster;
use crate::error::{Result, SyncError};

/// File name pattern for extracted frames
pub const FRAME_PATTERN: &str = "img_%04d.jpg";

/// Build ffmpeg arguments that write `clip` as JPEG stills into `folder`
pub fn burst_args(clip: &Path, frame_rate: f64, folder: &Path) -> Vec<OsString> {
    vec![
        "-nostdin".into(),
        "-i".into(),
        clip.as_os_str().to_owned(),
        "-q:v".into(),
        "2".into(),
        "-r".into(),
        frame_rate.to_string().into(),
        folder.join(FRAME_PATTERN).into_os_string(),
    ]
}

/// Create `folder`, refusing to reuse one that already exists
pub fn prepare_folder(folder: &Path) -> Result<()> {
    if let Some(parent) = folder.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match std::fs::create_dir(folder) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(SyncError::OutputExists(folder.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Bursts clips with `ffmpeg -i <clip> -r <fps> <folder>/img_%04d.jpg`
#[derive(Debug, Clone, Default)]
pub struct FfmpegBurster {
    ffmpeg: FfmpegCommand,
}

impl FfmpegBurster {
    /// Burst with the given ffmpeg invocation
    pub fn new(ffmpeg: FfmpegCommand) -> Self {
        Self { ffmpeg }
    }
}

impl FrameBurster for FfmpegBurster {
    fn burst(&self, clip: &Path, frame_rate: f64, folder: &Path) -> Result<PathBuf> {
        prepare_folder(folder)?;
        info!(
            clip = %clip.display(),
            frame_rate,
            folder = %folder.display(),
            "Bursting frames"
        );
        self.ffmpeg
            .run(&burst_args(clip, frame_rate, folder), false)
            .map_err(|message| SyncError::FrameBurstFailed {
                path: clip.to_path_buf(),
                message,
            })?;
        Ok(folder.to_path_buf())
    }
}
