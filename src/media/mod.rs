// Transcoder abstraction
//
// This module separates what the runner needs from the external media tool:
// - Commands: argument vector construction for a conversion request
// - Processor: ffmpeg-backed implementation that spawns the tool

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub use commands::*;
pub use processor::*;

use crate::config::TranscoderConfig;
use crate::error::Result;
use crate::job::{ConversionRequest, JobHandle};

/// Completion signal of one transcoder run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeCompletion {
    pub job_id: Uuid,
    /// Process exit code; -1 when the process was terminated by a signal
    pub return_code: i32,
    /// Tail of the transcoder's diagnostic output
    pub diagnostics: String,
}

impl TranscodeCompletion {
    pub fn succeeded(&self) -> bool {
        self.return_code == 0
    }
}

/// The external tool doing the byte-level conversion
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Build the invocation for a request
    fn build_command(&self, request: &ConversionRequest) -> Result<MediaCommand>;

    /// Run a command to completion.
    ///
    /// Dropping the returned future must stop the underlying process; the
    /// runner relies on this to enforce its timeout.
    async fn run(&self, job: JobHandle, command: &MediaCommand) -> Result<TranscodeCompletion>;

    /// Get transcoder version information
    async fn version_info(&self) -> Result<String>;
}

/// Factory for creating transcoder instances
pub struct TranscoderFactory;

impl TranscoderFactory {
    /// Create the default transcoder implementation (FFmpeg-based)
    pub fn create_transcoder(config: TranscoderConfig) -> Arc<dyn Transcoder> {
        Arc::new(processor::FfmpegTranscoder::new(config))
    }
}
