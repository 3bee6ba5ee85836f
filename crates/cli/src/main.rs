use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt};

use spotlight_core::{
    batch::{discover_videos, generate_samples, select_videos, BatchError, SpotlightProcessor},
    load_config_with_defaults,
    runner::ProgressDisplay,
    validate_config, Config, FfmpegTool, MediaProber, OutputCodec, OutputFormat,
};

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "SPOTLIGHT_CONFIG";

/// Configuration file picked up from the working directory.
const DEFAULT_CONFIG_FILE: &str = "spotlight.toml";

/// Exit code after an operator interrupt.
const INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "spotlight", version, about = "Normalize videos into size-capped 3:4 spotlight clips")]
struct Cli {
    /// Folder containing source videos.
    #[arg(long = "input", short = 'i', global = true, default_value = "input")]
    input: PathBuf,

    /// Folder receiving processed videos.
    #[arg(long = "output", short = 'o', global = true, default_value = "output")]
    output: PathBuf,

    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process selected videos, or the whole input folder with --bulk.
    Process(ProcessArgs),
    /// List input videos with their metadata as JSON.
    List,
    /// Show the detected hardware encoding capabilities.
    Capabilities,
    /// Create synthetic sample videos in the input folder.
    Sample,
    /// Check that ffmpeg and ffprobe are installed.
    Check,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// File names inside the input folder.
    files: Vec<String>,

    /// JSON array of file names inside the input folder.
    #[arg(long, conflicts_with = "files")]
    files_json: Option<String>,

    /// Process every video in the input folder.
    #[arg(long, conflicts_with_all = ["files", "files_json"])]
    bulk: bool,

    /// Number of parallel jobs (defaults to the CPU count with --bulk, 1 otherwise).
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Maximum output size per video in megabytes.
    #[arg(long)]
    max_size_mb: Option<f64>,

    /// Output codec: h264, h265, vp9 or prores.
    #[arg(long)]
    codec: Option<OutputCodec>,

    /// Output container: mp4, mov or mkv.
    #[arg(long)]
    format: Option<OutputFormat>,
}

/// One entry of `spotlight list`.
#[derive(Serialize)]
struct ListedVideo {
    filename: String,
    path: PathBuf,
    info: serde_json::Value,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let display = ProgressDisplay::terminal();
    init_logging(cli.verbose, display.clone());

    match run(cli, display).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log writer that clears the progress bars around each record.
#[derive(Clone)]
struct BarAwareWriter {
    display: ProgressDisplay,
}

impl Write for BarAwareWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.display.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for BarAwareWriter {
    type Writer = BarAwareWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn init_logging(verbose: bool, display: ProgressDisplay) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(BarAwareWriter { display }))
        .init();
}

/// Explicit flag, then the environment, then `spotlight.toml` if present.
fn config_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .or_else(|| {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.exists().then_some(local)
        })
}

async fn run(cli: Cli, display: ProgressDisplay) -> Result<ExitCode> {
    let config_path = config_path(cli.config.clone());
    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No configuration file, using defaults"),
    }
    let mut config = load_config_with_defaults(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    if let Command::Process(args) = &cli.cmd {
        apply_overrides(&mut config, args);
    }
    validate_config(&config).context("Configuration validation failed")?;

    match cli.cmd {
        Command::Check => check_tools(&config).await.map(|_| ExitCode::SUCCESS),
        Command::List => list_videos(&config, &cli.input).await,
        Command::Capabilities => show_capabilities(config).await,
        Command::Sample => create_samples(&config, &cli.input).await,
        Command::Process(args) => process(config, display, &cli.input, &cli.output, args).await,
    }
}

fn apply_overrides(config: &mut Config, args: &ProcessArgs) {
    if let Some(codec) = args.codec {
        config.encode.codec = codec;
    }
    if let Some(format) = args.format {
        config.encode.format = format;
    }
    if let Some(max_size_mb) = args.max_size_mb {
        config.encode.max_output_size_mb = max_size_mb;
    }
    if args.jobs.is_some() {
        config.batch.workers = args.jobs;
    }
}

async fn check_tools(config: &Config) -> Result<()> {
    let tool = FfmpegTool::new(config.tools.clone());
    let version = tool
        .validate()
        .await
        .context("ffmpeg and ffprobe must be installed (for example: brew install ffmpeg)")?;
    info!("Found: {}", version);
    Ok(())
}

async fn list_videos(config: &Config, input: &Path) -> Result<ExitCode> {
    let tool = FfmpegTool::new(config.tools.clone());
    let videos = discover_videos(input)
        .await
        .with_context(|| format!("Failed to read input folder {:?}", input))?;

    let mut listed = Vec::with_capacity(videos.len());
    for video in videos {
        let info = match tool.probe(&video.path).await {
            Ok(info) => serde_json::to_value(&info)?,
            Err(e) => {
                warn!(file = %video.filename, error = %e, "Could not get video info");
                serde_json::json!({})
            }
        };
        listed.push(ListedVideo {
            filename: video.filename,
            path: video.path,
            info,
        });
    }

    println!("{}", serde_json::to_string(&listed)?);
    Ok(ExitCode::SUCCESS)
}

async fn show_capabilities(config: Config) -> Result<ExitCode> {
    let processor = SpotlightProcessor::with_ffmpeg(config);
    let caps = processor.detect_capabilities().await;
    println!("{}", serde_json::to_string_pretty(&caps)?);
    Ok(ExitCode::SUCCESS)
}

async fn create_samples(config: &Config, input: &Path) -> Result<ExitCode> {
    check_tools(config).await?;
    let tool = FfmpegTool::new(config.tools.clone());
    let created = generate_samples(&tool, input)
        .await
        .context("Failed to create sample videos")?;

    if created.is_empty() {
        bail!("Failed to create sample videos");
    }
    for video in &created {
        println!("{}", video.path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Names requested through positional arguments or `--files-json`.
fn requested_files(args: &ProcessArgs) -> Result<Vec<String>> {
    let names = match &args.files_json {
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)
            .context("Invalid JSON provided for --files-json. Expected JSON array of filenames.")?,
        None => args.files.clone(),
    };
    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

async fn process(
    config: Config,
    display: ProgressDisplay,
    input: &Path,
    output: &Path,
    args: ProcessArgs,
) -> Result<ExitCode> {
    check_tools(&config).await?;

    if !input.exists() {
        warn!("Input folder {:?} not found, creating it", input);
        tokio::fs::create_dir_all(input)
            .await
            .with_context(|| format!("Failed to create input folder {:?}", input))?;
    }
    let available = discover_videos(input)
        .await
        .with_context(|| format!("Failed to read input folder {:?}", input))?;

    let (selected, workers) = if args.bulk {
        (available, config.batch.workers)
    } else {
        let names = requested_files(&args)?;
        if names.is_empty() {
            bail!("No videos selected: pass file names, --files-json, or --bulk");
        }
        let selected = select_videos(&available, &names).map_err(|missing| {
            anyhow::anyhow!(
                "The following files were not found in the input folder: {}",
                missing.join(", ")
            )
        })?;
        (selected, Some(args.jobs.unwrap_or(1)))
    };

    if selected.is_empty() {
        warn!("No videos found in {:?}", input);
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        codec = %config.encode.codec,
        format = %config.encode.format,
        "Input folder: {:?}, output folder: {:?}",
        input,
        output
    );
    info!("Maximum output size: {} MB per video", config.encode.max_output_size_mb);

    let max_size_mb = config.encode.max_output_size_mb;
    let display = if config.batch.show_progress {
        display
    } else {
        ProgressDisplay::hidden()
    };
    let processor = Arc::new(SpotlightProcessor::with_ffmpeg(config).with_display(display));

    let signal_processor = Arc::clone(&processor);
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Processing interrupted by user");
        signal_processor.shutdown();
    });

    let files = selected.into_iter().map(|v| v.path).collect();
    match processor.process_batch(files, output, workers, max_size_mb).await {
        Ok(summary) => {
            println!("{}", summary);
            println!(
                "Started at {}",
                summary.started_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
            );
            Ok(if summary.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(BatchError::Cancelled { partial }) => {
            let succeeded = partial.iter().filter(|r| r.succeeded).count();
            println!(
                "Processing interrupted: {} of {} finished videos succeeded",
                succeeded,
                partial.len()
            );
            Ok(ExitCode::from(INTERRUPTED))
        }
        Err(e) => Err(e).context("Batch processing failed"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("spotlight").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_process_with_overrides() {
        let cli = parse(&[
            "process", "--bulk", "-j", "3", "--codec", "hevc", "--format", ".mkv",
            "--max-size-mb", "8", "-i", "in", "-o", "out",
        ]);
        assert_eq!(cli.input, PathBuf::from("in"));
        assert_eq!(cli.output, PathBuf::from("out"));
        let Command::Process(args) = cli.cmd else {
            panic!("expected process");
        };
        assert!(args.bulk);

        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.encode.codec, OutputCodec::H265);
        assert_eq!(config.encode.format, OutputFormat::Mkv);
        assert_eq!(config.encode.max_output_size_mb, 8.0);
        assert_eq!(config.batch.workers, Some(3));
    }

    #[test]
    fn test_bulk_conflicts_with_files() {
        let result = Cli::try_parse_from(["spotlight", "process", "--bulk", "a.mp4"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_requested_files_from_json() {
        let cli = parse(&["process", "--files-json", r#"["a.mp4", " b.mov ", ""]"#]);
        let Command::Process(args) = cli.cmd else {
            panic!("expected process");
        };
        assert_eq!(requested_files(&args).unwrap(), vec!["a.mp4", "b.mov"]);
    }

    #[test]
    fn test_requested_files_rejects_non_array() {
        let cli = parse(&["process", "--files-json", r#"{"a": 1}"#]);
        let Command::Process(args) = cli.cmd else {
            panic!("expected process");
        };
        assert!(requested_files(&args).is_err());
    }

    #[test]
    fn test_log_writer_passes_records_through() {
        let mut writer = BarAwareWriter {
            display: ProgressDisplay::hidden(),
        };
        assert_eq!(writer.write(b"").unwrap(), 0);
        writer.flush().unwrap();

        let display = ProgressDisplay::terminal();
        let bar = display.start("clip.mp4", 10.0);
        let mut writer = BarAwareWriter { display }.make_writer();
        writer.write_all(b"").unwrap();
        bar.finish();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["list"]);
        assert_eq!(cli.input, PathBuf::from("input"));
        assert_eq!(cli.output, PathBuf::from("output"));
        assert!(!cli.verbose);
    }
}
