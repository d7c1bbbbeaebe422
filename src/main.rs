//! Audio converter command line
//!
//! Converts the best audio stream of a media file into FLAC, Opus, MP3,
//! Vorbis or AAC, carrying the source's tags over into the new file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_converter::config_file::{generate_default_config, ConfigFile};
use audio_converter::transcode::metadata::parse_tag;
use audio_converter::{
    Converter, ConverterConfig, Metadata, OutputCodec, Progress, TracingSink,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "audio-converter";

/// How often the progress line is refreshed
const PROGRESS_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about = "Convert the audio of a media file")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert the best audio stream of INPUT into OUTPUT
    Convert(ConvertArgs),
    /// Show the audio stream a conversion would use
    Probe {
        input: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the output codecs and the encoders they resolve to
    Codecs,
    /// Write a default configuration file
    InitConfig { path: PathBuf },
}

#[derive(Debug, Args)]
struct ConvertArgs {
    input: PathBuf,
    output: PathBuf,
    /// Output codec (opus, flac, mp3, vorbis, aac)
    #[arg(long, short)]
    codec: OutputCodec,
    /// Output tag as key=value; repeatable
    #[arg(long = "meta", short, value_parser = parse_meta)]
    meta: Vec<(String, String)>,
    /// Target bit rate in bits per second
    #[arg(long)]
    bit_rate: Option<u64>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_meta(arg: &str) -> Result<(String, String), String> {
    parse_tag(arg).ok_or_else(|| format!("expected key=value, got '{}'", arg))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_file = match &cli.command {
        Command::Convert(args) => match &args.config {
            Some(path) => Some(ConfigFile::from_file(path)?),
            None => None,
        },
        _ => None,
    };
    let log_json = config_file
        .as_ref()
        .and_then(ConfigFile::log_format)
        .map_or(false, |f| f.eq_ignore_ascii_case("json"));
    let config = config_file
        .map(ConfigFile::into_converter_config)
        .unwrap_or_default();

    init_logging(&config.log_level, log_json);
    tracing::debug!("{} v{} starting", APP_NAME, VERSION);

    audio_converter::ffmpeg::init()?;
    audio_converter::ffmpeg::install_log_forwarder(ffmpeg_log_level(&config.log_level));
    tracing::debug!("FFmpeg version: {}", audio_converter::ffmpeg::version_info());

    match cli.command {
        Command::Convert(args) => convert(args, config),
        Command::Probe { input, json } => probe(&input, json),
        Command::Codecs => {
            list_codecs();
            Ok(())
        }
        Command::InitConfig { path } => {
            generate_default_config(&path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

fn convert(args: ConvertArgs, mut config: ConverterConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(bit_rate) = args.bit_rate {
        config.encoding.bit_rate = Some(bit_rate);
    }

    let output = if config.output.append_extension {
        args.codec.normalize_output_path(&args.output)
    } else {
        args.output.clone()
    };
    let metadata: Metadata = args.meta.into_iter().collect();

    let mut converter = Converter::with_config(&args.input, config, Arc::new(TracingSink));
    converter.initialize()?;

    let progress = converter.progress_handle();
    let finished = AtomicBool::new(false);
    let show_progress = !args.json;

    let report = std::thread::scope(|scope| {
        scope.spawn(|| {
            if show_progress {
                poll_progress(&progress, &finished);
            }
        });
        let result = converter.convert(args.codec, &output, &metadata);
        finished.store(true, Ordering::Release);
        result
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} -> {} ({} via {}, {} Hz, {} ch, {} kb/s, {:.2}s)",
            args.input.display(),
            report.output_path.display(),
            report.codec,
            report.encoder,
            report.sample_rate,
            report.channels,
            report.bit_rate / 1000,
            report.duration_secs
        );
        if report.frames_dropped > 0 {
            println!("{} frames could not be resampled", report.frames_dropped);
        }
    }

    converter.release();
    Ok(())
}

/// Print the percentage to stderr whenever it changes, until `finished`.
fn poll_progress(progress: &Progress, finished: &AtomicBool) {
    let mut last = None;
    while !finished.load(Ordering::Acquire) {
        let value = progress.get();
        if last != Some(value) {
            eprint!("\r{:3}%", value);
            last = Some(value);
        }
        std::thread::sleep(PROGRESS_POLL);
    }
    eprintln!("\r{:3}%", progress.get());
}

fn probe(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut converter = Converter::new(input);
    converter.initialize()?;
    let Some(info) = converter.source_info() else {
        return Err("no source information".into());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("file:        {}", info.path.display());
    println!("stream:      {}", info.stream_index);
    println!("codec:       {}", info.codec);
    println!("sample rate: {} Hz", info.sample_rate);
    println!("channels:    {} ({})", info.channels, info.channel_layout);
    println!("format:      {}", info.sample_format);
    if info.bit_rate > 0 {
        println!("bit rate:    {} kb/s", info.bit_rate / 1000);
    }
    if let Some(duration) = info.duration_secs {
        println!("duration:    {:.3}s", duration);
    }
    for (key, value) in &info.metadata {
        println!("tag:         {}={}", key, value);
    }
    Ok(())
}

fn list_codecs() {
    for codec in OutputCodec::ALL {
        let encoder = codec
            .resolve_encoder()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "unavailable".to_string());
        println!("{:<8} {:<14} .{}", codec.name(), encoder, codec.extension());
    }
}

/// FFmpeg is noisy below WARN; only follow the configured level when it
/// asks for more detail than INFO.
fn ffmpeg_log_level(level: &str) -> Level {
    match level.parse::<Level>() {
        Ok(level) if level > Level::INFO || level == Level::ERROR => level,
        _ => Level::WARN,
    }
}

/// Initialize logging with tracing
fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("audio_converter={},ffmpeg={}", level, level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
