use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::job::FailureKind;

#[derive(Error, Debug)]
pub enum AudioripError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot resolve source: {0}")]
    Resolution(String),

    #[error("Cannot create output directory {}: {reason}", path.display())]
    DirectoryCreation { path: PathBuf, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transcoding failed with exit code {code}{}", format_diagnostics(diagnostics))]
    TranscodeFailure { code: i32, diagnostics: String },

    #[error("Transcoder not available: {0}")]
    TranscoderUnavailable(String),

    #[error("Transcoding timed out after {}", format_limit(.0))]
    Timeout(Duration),

    #[error("A conversion is already running (job {0})")]
    JobInProgress(Uuid),
}

fn format_diagnostics(diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(": {}", diagnostics)
    }
}

fn format_limit(limit: &Duration) -> String {
    if limit.subsec_millis() == 0 {
        format!("{} seconds", limit.as_secs())
    } else {
        format!("{} ms", limit.as_millis())
    }
}

impl AudioripError {
    /// Taxonomy bucket reported to the user alongside the message.
    pub fn kind(&self) -> FailureKind {
        match self {
            AudioripError::Resolution(_) => FailureKind::Resolution,
            AudioripError::DirectoryCreation { .. } => FailureKind::DirectoryCreation,
            AudioripError::InvalidRequest(_) | AudioripError::Config(_) => FailureKind::InvalidRequest,
            AudioripError::TranscodeFailure { .. } => FailureKind::TranscodeFailure,
            AudioripError::TranscoderUnavailable(_) => FailureKind::TranscoderUnavailable,
            AudioripError::Timeout(_) => FailureKind::Timeout,
            AudioripError::JobInProgress(_) => FailureKind::JobInProgress,
            AudioripError::Io(_) | AudioripError::Json(_) | AudioripError::Toml(_) => {
                FailureKind::TranscodeFailure
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AudioripError>;
