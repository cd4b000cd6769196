//! Audiorip - extract the audio track of a video file as MP3
//!
//! Entry point: parses the command line, sets up logging and configuration,
//! and drives a single conversion through the workflow.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use audiorip::cli::{Args, Commands};
use audiorip::config::Config;
use audiorip::error::AudioripError;
use audiorip::job::{Bitrate, ConversionProfile};
use audiorip::source::ArgumentPicker;
use audiorip::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "audiorip.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Convert { input, quality, name, output_dir, no_notify, timeout, ffmpeg } => {
            if let Some(dir) = output_dir {
                config.output.music_dir = dir;
            }
            if let Some(secs) = timeout {
                config.transcoder.timeout_secs = secs;
            }
            if let Some(binary) = ffmpeg {
                config.transcoder.binary_path = binary;
            }

            let mut profile = ConversionProfile {
                quality: config.output.default_quality,
                filename: name,
                notify_on_complete: config.notify.on_complete && !no_notify,
            };
            let music_dir = config.output.music_dir.clone();
            let workflow = Workflow::new(config);

            // A bad quality is reported like any other rejected request
            let outcome = match quality.map(|raw| raw.parse::<Bitrate>()).transpose() {
                Ok(chosen) => {
                    if let Some(bitrate) = chosen {
                        profile.quality = bitrate;
                    }
                    info!("Converting with quality {} into {}", profile.quality, music_dir.display());
                    workflow.convert_from(&ArgumentPicker::new(input), &profile).await
                }
                Err(e) => workflow.reject(e, &profile),
            };

            if !outcome.is_success() {
                anyhow::bail!(outcome.message());
            }
        }
        Commands::Check => {
            let workflow = Workflow::new(config);
            let version = workflow.check_transcoder().await?;
            println!("{}", version);
        }
        Commands::Qualities => {
            for bitrate in Bitrate::ALL {
                let marker = if bitrate == config.output.default_quality { " (default)" } else { "" };
                println!("{}{}", bitrate, marker);
            }
        }
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                return Err(AudioripError::Config(format!(
                    "{} already exists, use --force to replace it",
                    path.display()
                ))
                .into());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".audiorip").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "audiorip.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so stdout only carries results
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber.try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("audiorip.log").display());

    Ok(())
}
