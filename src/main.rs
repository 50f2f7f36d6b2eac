//! Whistlesync - command-line front end
//!
//! Finds a whistle in two recordings, cuts both to start just before it and
//! bursts the aligned clips into numbered frames.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use whistlesync::audio::detector::whistle_onset;
use whistlesync::config::SyncConfig;
use whistlesync::media::source::stream_name;
use whistlesync::media::{AutoSource, FfmpegBurster, FfmpegSource, FfmpegTrimmer, WaveformSource};
use whistlesync::sync::planner::align;
use whistlesync::sync::session::StreamInput;
use whistlesync::{CrossCorrelator, FrequencyBand, PreRollPolicy, SyncSession};

#[derive(Parser, Debug)]
#[command(name = "whistlesync", version, about = "Synchronise two recordings on a shared whistle")]
struct Cli {
    /// Config file (default: <config_dir>/whistlesync/config.json)
    #[arg(long, global = true, env = "WHISTLESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging and ffmpeg output on the terminal
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the whistle in both files, cut them and burst frames
    Sync {
        /// First recording
        first: PathBuf,
        /// Second recording
        second: PathBuf,
        /// Label for the first recording (also its frame folder)
        #[arg(long, default_value = "cam1")]
        first_name: String,
        /// Label for the second recording (also its frame folder)
        #[arg(long, default_value = "cam2")]
        second_name: String,
        /// Seconds of lead-in to keep before the whistle
        #[arg(long)]
        pre_roll: Option<f64>,
        /// Fail instead of clamping when the lead-in is too short
        #[arg(long)]
        strict: bool,
        /// Frames per second when bursting
        #[arg(long)]
        frame_rate: Option<f64>,
        /// Directory for clips and frame folders
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Only cut the clips, do not burst frames
        #[arg(long)]
        no_burst: bool,
        /// Delete the cut clips once their frames are extracted
        #[arg(long)]
        discard_clips: bool,
        #[command(flatten)]
        analysis: AnalysisArgs,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the whistle onset in each file
    Detect {
        /// Recordings to analyse
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Estimate the offset between two files by cross-correlation
    Offset {
        /// First recording
        first: PathBuf,
        /// Second recording
        second: PathBuf,
        /// Reject recordings longer than this many seconds
        #[arg(long)]
        max_duration: Option<f64>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<f64>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

/// Overrides shared by every analysis command
#[derive(Args, Debug, Default)]
struct AnalysisArgs {
    /// Lower edge of the whistle band in Hz
    #[arg(long)]
    low_hz: Option<f64>,
    /// Upper edge of the whistle band in Hz
    #[arg(long)]
    high_hz: Option<f64>,
    /// Detection threshold on filtered amplitude
    #[arg(short, long)]
    threshold: Option<f32>,
    /// Sample rate to decode audio at
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,
    /// ffmpeg executable
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
}

impl AnalysisArgs {
    fn apply(&self, config: &mut SyncConfig) {
        config.band = FrequencyBand::new(
            self.low_hz.unwrap_or(config.band.low_hz),
            self.high_hz.unwrap_or(config.band.high_hz),
        );
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            config.ffmpeg = ffmpeg.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config_path = cli.config.clone().unwrap_or_else(SyncConfig::path);
    let mut config = SyncConfig::load_from(&config_path);

    let result = match cli.command {
        Command::Sync {
            first,
            second,
            first_name,
            second_name,
            pre_roll,
            strict,
            frame_rate,
            output_dir,
            no_burst,
            discard_clips,
            analysis,
            json,
        } => {
            analysis.apply(&mut config);
            if let Some(secs) = pre_roll {
                config.pre_roll_secs = secs;
            }
            if strict {
                config.pre_roll_policy = PreRollPolicy::Strict;
            }
            if let Some(fps) = frame_rate {
                config.frame_rate = fps;
            }
            let a = StreamInput::new(first_name, first);
            let b = StreamInput::new(second_name, second);
            run_sync(&config, cli.verbose, &a, &b, output_dir, !no_burst, !discard_clips, json)
        }
        Command::Detect { files, analysis } => {
            analysis.apply(&mut config);
            run_detect(&config, cli.verbose, &files)
        }
        Command::Offset {
            first,
            second,
            max_duration,
            timeout,
            analysis,
        } => {
            analysis.apply(&mut config);
            if max_duration.is_some() {
                config.correlation.max_duration_secs = max_duration;
            }
            if timeout.is_some() {
                config.correlation.timeout_secs = timeout;
            }
            run_offset(&config, cli.verbose, &first, &second)
        }
        Command::Config { save, analysis } => {
            analysis.apply(&mut config);
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                config.save(&config_path)?;
                println!("Saved to {}", config_path.display());
            }
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "Synchronisation aborted");
    }
    result
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("whistlesync={}", level).parse()?)
                .add_directive(format!("whistlesync_core={}", level).parse()?),
        )
        .init();
    Ok(())
}

fn source(config: &SyncConfig, verbose: bool) -> AutoSource {
    AutoSource::new(FfmpegSource::new(
        config.ffmpeg_command(verbose),
        config.sample_rate,
    ))
}

#[allow(clippy::too_many_arguments)]
fn run_sync(
    config: &SyncConfig,
    verbose: bool,
    a: &StreamInput,
    b: &StreamInput,
    output_dir: PathBuf,
    burst_frames: bool,
    keep_clips: bool,
    json: bool,
) -> Result<()> {
    let options = config.session_options(output_dir, burst_frames, keep_clips)?;
    let session = SyncSession::new(
        source(config, verbose),
        FfmpegTrimmer::new(config.ffmpeg_command(verbose)),
        FfmpegBurster::new(config.ffmpeg_command(verbose)),
        options,
    );

    info!(first = %a.path.display(), second = %b.path.display(), "Synchronising");
    let report = session.run(a, b)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for stream in &report.streams {
        println!(
            "Whistle at {:.3}s in {}",
            stream.onset_secs,
            stream.source.display()
        );
        let note = if stream.trim.clamped {
            " (pre-roll shortened)"
        } else {
            ""
        };
        println!("  cut at {:.3}s{}", stream.trim.start_secs, note);
        if let Some(clip) = &stream.clip {
            println!("  clip:   {}", clip.display());
        }
        if let Some(frames) = &stream.frames {
            println!("  frames: {}", frames.display());
        }
    }
    println!("Offset {:+.3}s", report.relative_offset_secs);
    Ok(())
}

fn run_detect(config: &SyncConfig, verbose: bool, files: &[PathBuf]) -> Result<()> {
    let source = source(config, verbose);
    let threshold = config.detection_threshold()?;

    for file in files {
        let name = stream_name(file);
        let detection = source
            .load(file)
            .and_then(|waveform| whistle_onset(&waveform, config.band, threshold))
            .map_err(|e| e.for_stream(name))?;
        println!(
            "Whistle at {:.3}s in {} (sample {})",
            detection.onset.as_secs(),
            file.display(),
            detection.onset_index
        );
    }
    Ok(())
}

fn run_offset(
    config: &SyncConfig,
    verbose: bool,
    first: &Path,
    second: &Path,
) -> Result<()> {
    let session = SyncSession::new(
        source(config, verbose),
        FfmpegTrimmer::new(config.ffmpeg_command(verbose)),
        FfmpegBurster::new(config.ffmpeg_command(verbose)),
        config.session_options(PathBuf::from("."), false, true)?,
    );
    let a = StreamInput::new(stream_name(first), first);
    let b = StreamInput::new(stream_name(second), second);
    let correlation =
        session.correlate_pair(&a, &b, &CrossCorrelator::with_limits(config.correlation))?;

    println!(
        "Offset {:+.4}s ({} samples, confidence {:.1}%)",
        correlation.offset.as_secs(),
        correlation.lag_samples,
        correlation.confidence * 100.0
    );
    println!("Positive means the audio occurs later in {}", b.path.display());

    let trims = align(&a.id, &b.id, correlation.offset)?;
    for input in [&a, &b] {
        if let Some(trim) = trims.get(&input.id) {
            println!("  cut {} at {:.3}s", input.path.display(), trim.start_secs);
        }
    }
    Ok(())
}
