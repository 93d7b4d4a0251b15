//! vidxport - Raw video chunk export
//!
//! Command line entry point: `transcode` runs the export pipeline on a raw
//! chunk, `provision` installs ffmpeg and vgmstream.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidxport::cli::{Args, Commands};
use vidxport::config::Config;
use vidxport::error::{ExportError, EXIT_TOOL_MISSING};
use vidxport::job::TranscodeJob;
use vidxport::media::ProcessRunner;
use vidxport::pipeline::TranscodePipeline;
use vidxport::setup::{AlwaysConsent, ConsentPrompt, Provisioner, TerminalConsent};
use vidxport::tools::{ToolLocator, ToolPaths};

const DEFAULT_CONFIG_FILE: &str = "vidxport.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<ExportError>()
                .map(ExportError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match &args.command {
        Commands::Provision { tools_dir: Some(dir), .. } => config.tools.root = dir.clone(),
        Commands::Transcode { out_dir: Some(dir), .. } => config.export.output_dir = dir.clone(),
        _ => {}
    }

    let _guard = setup_logging(args.verbose, &log_dir(&config, &args.command))?;

    match args.command {
        Commands::Transcode { input, id, name, video_tool, audio_tool, .. } => {
            let installed = ToolLocator::new(&config.tools.root).locate_all();
            let tools = ToolPaths {
                video: video_tool.or(installed.video),
                audio: audio_tool.or(installed.audio),
            };

            let job = TranscodeJob::new(id, name);
            let pipeline = TranscodePipeline::new(config.export.clone(), Box::new(ProcessRunner));

            pipeline.stage_input(&job, &input).await?;
            let merged = pipeline.run(&job, &tools).await?;

            println!("{}", merged.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Provision { yes, .. } => {
            let consent: Box<dyn ConsentPrompt> = if yes {
                Box::new(AlwaysConsent)
            } else {
                Box::new(TerminalConsent)
            };

            let provisioner = Provisioner::new(config.tools.clone(), Box::new(ProcessRunner), consent)?;
            let tools = provisioner.ensure().await?;

            if tools.is_ready() {
                info!("All tools are ready");
                Ok(ExitCode::SUCCESS)
            } else {
                for kind in tools.missing() {
                    warn!("{} is still missing", kind);
                    eprintln!("{} is still missing", kind);
                }
                Ok(ExitCode::from(EXIT_TOOL_MISSING as u8))
            }
        }
    }
}

/// Log files live next to what the command writes: the export output
/// directory for `transcode`, the tools root for `provision`.
fn log_dir(config: &Config, command: &Commands) -> PathBuf {
    match command {
        Commands::Transcode { .. } => config.export.output_dir.join("log"),
        Commands::Provision { .. } => config.tools.root.join("log"),
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, "vidxport.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("vidxport.log").display());

    Ok(guard)
}
