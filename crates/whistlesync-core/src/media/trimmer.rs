//! Stream-copy trimming of media files

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use super::ffmpeg::FfmpegCommand;
use super::ClipTrimmer;
use crate::error::{Result, SyncError};
use crate::sync::planner::TrimInstruction;

/// Output path for stream `stream`'s trimmed copy of `input`
///
/// `<out_dir>/cut-<stream>.<input extension>`. Naming by stream keeps two
/// inputs with the same file name apart.
pub fn cut_path(input: &Path, stream: &str, out_dir: &Path) -> PathBuf {
    let name = match input.extension() {
        Some(ext) => format!("cut-{}.{}", stream, ext.to_string_lossy()),
        None => format!("cut-{}", stream),
    };
    out_dir.join(name)
}

/// Build ffmpeg arguments that cut `input` at `start_secs` without re-encoding
///
/// `-ss` comes before `-i` so ffmpeg seeks the input rather than decoding
/// and discarding everything up to the start time.
pub fn trim_args(input: &Path, start_secs: f64, output: &Path) -> Vec<OsString> {
    vec![
        "-nostdin".into(),
        "-n".into(),
        "-ss".into(),
        format!("{:.3}", start_secs).into(),
        "-i".into(),
        input.as_os_str().to_owned(),
        "-vcodec".into(),
        "copy".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Trims clips with `ffmpeg -ss <start> -i <in> -vcodec copy <out>`
#[derive(Debug, Clone, Default)]
pub struct FfmpegTrimmer {
    ffmpeg: FfmpegCommand,
}

impl FfmpegTrimmer {
    /// Trim with the given ffmpeg invocation
    pub fn new(ffmpeg: FfmpegCommand) -> Self {
        Self { ffmpeg }
    }
}

impl ClipTrimmer for FfmpegTrimmer {
    fn trim(&self, input: &Path, instruction: &TrimInstruction, out_dir: &Path) -> Result<PathBuf> {
        let output = self.clip_path(input, &instruction.stream, out_dir);
        if output.exists() {
            return Err(SyncError::OutputExists(output));
        }
        std::fs::create_dir_all(out_dir)?;
        info!(
            stream = %instruction.stream,
            input = %input.display(),
            start_secs = instruction.start_secs,
            "Cutting clip"
        );
        self.ffmpeg
            .run(&trim_args(input, instruction.start_secs, &output), false)
            .map_err(|message| SyncError::ClipTrimFailed {
                path: input.to_path_buf(),
                message,
            })?;
        Ok(output)
    }
}
