use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the audio of a video file as MP3
    Convert {
        /// Input video: a path, a file:// URI, or - for stdin
        #[arg(short, long)]
        input: Option<String>,

        /// Audio quality (128k, 192k, 256k, 320k)
        #[arg(short, long)]
        quality: Option<String>,

        /// Output filename; .mp3 is appended when missing
        #[arg(short, long)]
        name: Option<String>,

        /// Directory receiving the MP3 file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Do not write a persistent notification
        #[arg(long)]
        no_notify: bool,

        /// Seconds before the conversion is aborted (0 = no limit)
        #[arg(long)]
        timeout: Option<u64>,

        /// Path to the ffmpeg binary
        #[arg(long)]
        ffmpeg: Option<String>,
    },

    /// Check that the transcoder can be executed
    Check,

    /// List the available audio qualities
    Qualities,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination of the configuration file
        #[arg(default_value = "audiorip.toml")]
        path: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}
