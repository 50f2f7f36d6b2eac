//! Thin wrapper around the `ffmpeg` executable

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// Bytes of stderr kept in error messages
const STDERR_TAIL_BYTES: usize = 2048;

/// How to invoke ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Executable to run (looked up on PATH when not absolute)
    pub program: PathBuf,
    /// Forward ffmpeg's own output to the terminal
    pub verbose: bool,
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            verbose: false,
        }
    }
}

impl FfmpegCommand {
    /// Use a specific ffmpeg binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Set verbosity
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run ffmpeg with `args`
    ///
    /// With `capture_stdout` the child's stdout is returned (used for raw
    /// PCM); otherwise it is discarded or, when verbose, inherited. Errors
    /// come back as a message ready to embed in a [`crate::SyncError`].
    pub fn run(&self, args: &[OsString], capture_stdout: bool) -> Result<Vec<u8>, String> {
        debug!(program = %self.program.display(), ?args, "Running ffmpeg");

        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null());
        cmd.stdout(if capture_stdout {
            Stdio::piped()
        } else if self.verbose {
            Stdio::inherit()
        } else {
            Stdio::null()
        });
        cmd.stderr(if self.verbose {
            Stdio::inherit()
        } else {
            Stdio::piped()
        });

        let output = cmd
            .output()
            .map_err(|e| format!("failed to execute {}: {}", self.program.display(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail_start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
            let tail = stderr
                .get(tail_start..)
                .unwrap_or(&stderr)
                .trim();
            return Err(if tail.is_empty() {
                format!("ffmpeg exited with {}", output.status)
            } else {
                format!("ffmpeg exited with {}: {}", output.status, tail)
            });
        }

        Ok(output.stdout)
    }
}
