//! pcmstream - decode audio files and report their normalized form
//!
//! Each file is opened through the decode engine, streamed or preloaded,
//! and summarized once decoding has finished.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use pcmstream::audio::AudioSource;
use pcmstream::{
    ContainerFormat, DecodeEngine, DecodeMode, DecodeRequest, DecodeSession, FileConfig, ModePreference,
    SampleEncoding, SessionState,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the config file
const CONFIG_ENV_VAR: &str = "PCMSTREAM_CONFIG";

/// Command-line arguments for pcmstream
#[derive(Parser, Debug)]
#[command(name = "pcmstream")]
#[command(about = "Decode WAV/MP3/AIFF/OGG files to 44.1kHz float samples")]
#[command(version)]
struct Args {
    /// Config file (TOML with [engine] and [logging] tables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stream every file from disk on a background task
    #[arg(long, conflicts_with = "eager")]
    streaming: bool,

    /// Decode every file fully before reporting
    #[arg(long)]
    eager: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Audio files to decode
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Per-file decode summary
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    format: ContainerFormat,
    mode: DecodeMode,
    state: SessionState,
    sample_rate: u32,
    native_sample_rate: u32,
    channels: u16,
    encoding: SampleEncoding,
    replaygain: f32,
    samples: u64,
    frames: u64,
    duration_secs: f64,
}

impl FileReport {
    fn from_session(session: &DecodeSession) -> Self {
        let info = session.info();
        let samples = session.decoded_samples();
        let frames = samples / info.channels as u64;
        Self {
            file: info.name.clone(),
            format: info.format,
            mode: session.mode(),
            state: session.state(),
            sample_rate: info.sample_rate,
            native_sample_rate: info.native_sample_rate,
            channels: info.channels,
            encoding: info.encoding,
            replaygain: info.replaygain,
            samples,
            frames,
            duration_secs: frames as f64 / info.sample_rate as f64,
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    files: Vec<FileReport>,
    unavailable: Vec<String>,
    budget_kb: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = match pcmstream_common::resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR) {
        Some(path) => FileConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FileConfig::default(),
    };

    // Initialize tracing
    let default_filter = format!("pcmstream={}", config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = DecodeEngine::new(config.engine, tokio::runtime::Handle::current())
        .context("Failed to initialize decode engine")?;
    info!("Decode engine initialized ({} files)", args.files.len());

    let mut report = Report {
        files: Vec::new(),
        unavailable: Vec::new(),
        budget_kb: 0,
    };

    // One file at a time: a new streaming session would supersede the last
    for path in &args.files {
        match open(&engine, &args, path) {
            Some(session) => {
                session.wait().await;
                report.files.push(FileReport::from_session(&session));
                session.dispose();
            }
            None => report.unavailable.push(path.display().to_string()),
        }
    }
    report.budget_kb = engine.budget().total_kilobytes();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_report(&report);
    }

    Ok(())
}

fn open(engine: &DecodeEngine, args: &Args, path: &Path) -> Option<DecodeSession> {
    if args.streaming {
        engine.open_streaming(path)
    } else if args.eager {
        engine.open(
            DecodeRequest::new(AudioSource::File(path.to_path_buf())).with_mode(ModePreference::Eager),
        )
    } else {
        engine.open_path(path)
    }
}

fn print_report(report: &Report) {
    for file in &report.files {
        println!("{}", file.file);
        println!(
            "  {} {:?} -> {}Hz ({}Hz native), {} ch, {:?}",
            file.format, file.mode, file.sample_rate, file.native_sample_rate, file.channels, file.encoding
        );
        println!(
            "  {} frames ({} samples, {:.3}s), replaygain {:.3}, {:?}",
            file.frames, file.samples, file.duration_secs, file.replaygain, file.state
        );
    }
    for file in &report.unavailable {
        println!("{}\n  unavailable", file);
    }
    println!("budget: {} KB", report.budget_kb);
}
