use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, debug};

use crate::config::TranscoderConfig;
use crate::error::{Result, AudioripError};
use crate::job::{ConversionRequest, JobHandle};
use super::{MediaCommand, MediaCommandBuilder, TranscodeCompletion, Transcoder};

/// Number of trailing stderr lines kept as failure diagnostics
const DIAGNOSTIC_LINES: usize = 20;

/// Transcoder backed by an ffmpeg binary
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegTranscoder {
    /// Create a new ffmpeg transcoder
    pub fn new(config: TranscoderConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }

    fn spawn_error(&self, binary: &str, e: std::io::Error) -> AudioripError {
        if e.kind() == std::io::ErrorKind::NotFound {
            AudioripError::TranscoderUnavailable(format!("{}: {}", binary, e))
        } else {
            AudioripError::Io(e)
        }
    }
}

/// Keep the last `max` non-empty lines of `output`
pub fn tail_lines(output: &str, max: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(max);
    lines[start..].join("\n")
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn build_command(&self, request: &ConversionRequest) -> Result<MediaCommand> {
        self.command_builder.extract_mp3(request, &self.config.extra_args)
    }

    async fn run(&self, job: JobHandle, command: &MediaCommand) -> Result<TranscodeCompletion> {
        info!("Starting {} for job {}", command.description, job.id);
        debug!("Executing transcoder command: {}", command.display_line());

        let child = Command::new(&command.binary_path)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(&command.binary_path, e))?;

        let output = child.wait_with_output().await?;
        let return_code = output.status.code().unwrap_or(-1);
        let diagnostics = tail_lines(&String::from_utf8_lossy(&output.stderr), DIAGNOSTIC_LINES);

        debug!("Job {} exited with code {}", job.id, return_code);

        Ok(TranscodeCompletion {
            job_id: job.id,
            return_code,
            diagnostics,
        })
    }

    async fn version_info(&self) -> Result<String> {
        debug!("Getting transcoder version information");

        let command = self.command_builder.version_check();
        let output = Command::new(&command.binary_path)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(&command.binary_path, e))?;

        if output.status.success() {
            let version_info = String::from_utf8_lossy(&output.stdout);
            // Extract the first line which typically contains the version
            let first_line = version_info.lines().next().unwrap_or("Unknown version");
            Ok(first_line.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AudioripError::TranscoderUnavailable(format!(
                "Version check failed: {}",
                tail_lines(&stderr, DIAGNOSTIC_LINES)
            )))
        }
    }
}
