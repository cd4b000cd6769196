use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, AudioripError};
use crate::job::Bitrate;

fn default_timeout_secs() -> u64 {
    1800
}

fn default_music_dir() -> PathBuf {
    let base = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("Music").join("MP4toMP3")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transcoder: TranscoderConfig,
    pub output: OutputConfig,
    pub source: SourceConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Seconds to wait for a conversion before killing it (0 = no limit)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Additional arguments placed between the bitrate flag and the output path
    /// e.g. ["-ar", "44100"] or ["-map_metadata", "0"]
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the converted MP3 files
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,
    /// Quality used when none is given on the command line
    #[serde(default)]
    pub default_quality: Bitrate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Where temporary copies of sources are materialized (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    /// Copy every source to a temporary file, even regular files
    #[serde(default)]
    pub always_copy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Write a persistent notification for finished jobs
    pub on_complete: bool,
    /// JSON lines file receiving persistent notifications
    pub log_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcoder: TranscoderConfig {
                binary_path: "ffmpeg".to_string(),
                timeout_secs: default_timeout_secs(),
                extra_args: vec![
                    // Example options users can customize:
                    // "-ar".to_string(), "44100".to_string(),        // Output sample rate
                    // "-map_metadata".to_string(), "0".to_string(),  // Keep container tags
                ],
            },
            output: OutputConfig {
                music_dir: default_music_dir(),
                default_quality: Bitrate::K320,
            },
            source: SourceConfig {
                temp_dir: None,
                always_copy: false,
            },
            notify: NotifyConfig {
                on_complete: true,
                log_path: PathBuf::from(".audiorip").join("notifications.jsonl"),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AudioripError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| AudioripError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AudioripError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| AudioripError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// `None` means the transcoder may run indefinitely
    pub fn timeout(&self) -> Option<std::time::Duration> {
        match self.transcoder.timeout_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }
}
