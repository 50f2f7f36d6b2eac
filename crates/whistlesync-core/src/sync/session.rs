//! End-to-end synchronisation of one pair of recordings
//!
//! A session decodes both streams, finds the whistle in each, plans the
//! trims, cuts the clips and bursts them into frames. The two per-stream
//! analyses run on separate threads since each owns its own waveform.
//! Any failure aborts the pair and names the stream it came from; there is
//! no fallback from the detector to the correlator or back.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::correlation::{Correlation, CrossCorrelator};
use crate::audio::detector::{whistle_onset, Detection};
use crate::audio::types::{DetectionThreshold, FrequencyBand, TimeOffset};
use crate::audio::waveform::Waveform;
use crate::error::{Result, SyncError};
use crate::media::{ClipTrimmer, FrameBurster, WaveformSource};
use crate::sync::planner::{PreRollPolicy, SyncPlanner, TrimInstruction};

/// One recording taking part in a session
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInput {
    /// Label used in logs, errors and output folder names
    pub id: String,
    /// Media file
    pub path: PathBuf,
}

impl StreamInput {
    /// Create an input
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Tunables for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Whistle pass-band
    pub band: FrequencyBand,
    /// Detection threshold on filtered amplitude
    pub threshold: DetectionThreshold,
    /// Lead-in kept before the whistle
    pub pre_roll_secs: f64,
    /// Clamp or fail when the lead-in is short
    pub policy: PreRollPolicy,
    /// Frames per second when bursting
    pub frame_rate: f64,
    /// Where clips and frame folders are written
    pub output_dir: PathBuf,
    /// Burst trimmed clips into frames
    pub burst_frames: bool,
    /// Keep the trimmed clips after bursting
    pub keep_clips: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            band: FrequencyBand::default(),
            threshold: DetectionThreshold::default(),
            pre_roll_secs: crate::DEFAULT_PRE_ROLL_SECS,
            policy: PreRollPolicy::default(),
            frame_rate: crate::DEFAULT_FRAME_RATE,
            output_dir: PathBuf::from("."),
            burst_frames: true,
            keep_clips: true,
        }
    }
}

/// Outcome for one stream
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    /// Stream label
    pub id: String,
    /// Input media file
    pub source: PathBuf,
    /// Whistle onset within the stream, in seconds
    pub onset_secs: f64,
    /// Where the stream was cut
    pub trim: TrimInstruction,
    /// Trimmed clip, if it was kept
    pub clip: Option<PathBuf>,
    /// Folder of extracted frames, if bursting was enabled
    pub frames: Option<PathBuf>,
}

/// Outcome of a whole session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Per-stream results, in input order
    pub streams: Vec<StreamReport>,
    /// Onset in the second stream minus onset in the first, in seconds
    pub relative_offset_secs: f64,
}

/// Drives one pair of recordings through the whole pipeline
pub struct SyncSession<S, T, F> {
    source: S,
    trimmer: T,
    burster: F,
    options: SessionOptions,
}

impl<S, T, F> SyncSession<S, T, F>
where
    S: WaveformSource,
    T: ClipTrimmer,
    F: FrameBurster,
{
    /// Create a session from its collaborators
    pub fn new(source: S, trimmer: T, burster: F, options: SessionOptions) -> Self {
        Self {
            source,
            trimmer,
            burster,
            options,
        }
    }

    /// Session options
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Decode one stream
    pub fn load(&self, input: &StreamInput) -> Result<Waveform> {
        self.source
            .load(&input.path)
            .map_err(|e| e.for_stream(&input.id))
    }

    /// Decode one stream and find its whistle
    pub fn detect(&self, input: &StreamInput) -> Result<Detection> {
        let started = Instant::now();
        let waveform = self.load(input)?;
        let detection = whistle_onset(&waveform, self.options.band, self.options.threshold)
            .map_err(|e| e.for_stream(&input.id))?;
        info!(
            stream = %input.id,
            onset_secs = detection.onset.as_secs(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Whistle detected"
        );
        Ok(detection)
    }

    /// Detect both streams concurrently
    ///
    /// If both fail, the first stream's error is returned.
    pub fn detect_pair(&self, a: &StreamInput, b: &StreamInput) -> Result<(Detection, Detection)> {
        let (ra, rb) = self.both(a, b, |input| self.detect(input));
        Ok((ra?, rb?))
    }

    /// Decode both streams concurrently and cross-correlate them
    ///
    /// The offset is positive when the shared audio occurs later in `b`.
    pub fn correlate_pair(
        &self,
        a: &StreamInput,
        b: &StreamInput,
        correlator: &CrossCorrelator,
    ) -> Result<Correlation> {
        let (wa, wb) = self.both(a, b, |input| self.load(input));
        let correlation = correlator.correlate_bounded(wa?, wb?)?;
        info!(
            a = %a.id,
            b = %b.id,
            offset_secs = correlation.offset.as_secs(),
            confidence = correlation.confidence,
            "Cross-correlation offset"
        );
        Ok(correlation)
    }

    /// Run the full pipeline: detect, plan, trim, burst
    ///
    /// Outputs for both streams are checked before anything is cut, and a
    /// failure part way through removes what this call already wrote, so
    /// an error leaves no output for the pair.
    pub fn run(&self, a: &StreamInput, b: &StreamInput) -> Result<SessionReport> {
        if a.id == b.id {
            return Err(SyncError::DuplicateStream(a.id.clone()));
        }
        let (da, db) = self.detect_pair(a, b)?;

        let planner = SyncPlanner::new(self.options.pre_roll_secs)?.with_policy(self.options.policy);
        let trim_a = planner.plan_one(&a.id, da.onset)?;
        let trim_b = planner.plan_one(&b.id, db.onset)?;

        self.check_outputs(a)?;
        self.check_outputs(b)?;

        let first = self.cut_and_burst(a, da.onset, trim_a)?;
        let second = match self.cut_and_burst(b, db.onset, trim_b) {
            Ok(report) => report,
            Err(e) => {
                self.discard_outputs(a);
                return Err(e);
            }
        };

        let relative = db.onset.as_secs() - da.onset.as_secs();
        info!(relative_offset_secs = relative, "Synchronisation complete");

        Ok(SessionReport {
            streams: vec![first, second],
            relative_offset_secs: relative,
        })
    }

    fn clip_path(&self, input: &StreamInput) -> PathBuf {
        self.trimmer
            .clip_path(&input.path, &input.id, &self.options.output_dir)
    }

    fn frame_folder(&self, input: &StreamInput) -> PathBuf {
        self.options.output_dir.join(&input.id)
    }

    /// Fail with `OutputExists` if a clip or frame folder is already there
    fn check_outputs(&self, input: &StreamInput) -> Result<()> {
        let clip = self.clip_path(input);
        if clip.exists() {
            return Err(SyncError::OutputExists(clip).for_stream(&input.id));
        }
        let folder = self.frame_folder(input);
        if self.options.burst_frames && folder.exists() {
            return Err(SyncError::OutputExists(folder).for_stream(&input.id));
        }
        Ok(())
    }

    /// Remove the clip and frame folder written for `input`, if any
    fn discard_outputs(&self, input: &StreamInput) {
        let clip = self.clip_path(input);
        if clip.exists() {
            remove_intermediate(&clip);
        }
        let folder = self.frame_folder(input);
        if self.options.burst_frames && folder.exists() {
            if let Err(e) = std::fs::remove_dir_all(&folder) {
                warn!(path = %folder.display(), error = %e, "Failed to remove frame folder");
            }
        }
        debug!(stream = %input.id, "Discarded partial output");
    }

    fn cut_and_burst(
        &self,
        input: &StreamInput,
        onset: TimeOffset,
        trim: TrimInstruction,
    ) -> Result<StreamReport> {
        let out_dir = &self.options.output_dir;
        let clip = match self.trimmer.trim(&input.path, &trim, out_dir) {
            Ok(clip) => clip,
            Err(e) => {
                // ffmpeg may have left a partial file behind
                self.discard_outputs(input);
                return Err(e.for_stream(&input.id));
            }
        };

        let frames = if self.options.burst_frames {
            let folder = self.frame_folder(input);
            match self.burster.burst(&clip, self.options.frame_rate, &folder) {
                Ok(folder) => Some(folder),
                Err(e) => {
                    self.discard_outputs(input);
                    return Err(e.for_stream(&input.id));
                }
            }
        } else {
            None
        };

        let clip = if self.options.keep_clips || frames.is_none() {
            Some(clip)
        } else {
            remove_intermediate(&clip);
            None
        };

        Ok(StreamReport {
            id: input.id.clone(),
            source: input.path.clone(),
            onset_secs: onset.as_secs(),
            trim,
            clip,
            frames,
        })
    }

    /// Run `work` for both inputs on scoped threads
    fn both<R, W>(&self, a: &StreamInput, b: &StreamInput, work: W) -> (Result<R>, Result<R>)
    where
        R: Send,
        W: Fn(&StreamInput) -> Result<R> + Sync,
    {
        std::thread::scope(|scope| {
            let ha = scope.spawn(|| work(a));
            let hb = scope.spawn(|| work(b));
            (join_stream(ha, &a.id), join_stream(hb, &b.id))
        })
    }
}

fn join_stream<R>(handle: std::thread::ScopedJoinHandle<'_, Result<R>>, id: &str) -> Result<R> {
    handle.join().unwrap_or_else(|_| {
        Err(SyncError::Io(std::io::Error::other("analysis thread panicked")).for_stream(id))
    })
}

fn remove_intermediate(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove intermediate clip");
    }
}
