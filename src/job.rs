//! Values passed between the resolver, planner, runner and notifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AudioripError, Result};

/// Target audio bitrate. Only the values offered by the quality picker are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Bitrate {
    #[serde(rename = "128k")]
    K128,
    #[serde(rename = "192k")]
    K192,
    #[serde(rename = "256k")]
    K256,
    #[default]
    #[serde(rename = "320k")]
    K320,
}

impl Bitrate {
    pub const ALL: [Bitrate; 4] = [Bitrate::K128, Bitrate::K192, Bitrate::K256, Bitrate::K320];

    /// Value passed to the transcoder's `-b:a` flag
    pub fn as_arg(&self) -> &'static str {
        match self {
            Bitrate::K128 => "128k",
            Bitrate::K192 => "192k",
            Bitrate::K256 => "256k",
            Bitrate::K320 => "320k",
        }
    }

    pub fn kbps(&self) -> u32 {
        match self {
            Bitrate::K128 => 128,
            Bitrate::K192 => 192,
            Bitrate::K256 => 256,
            Bitrate::K320 => 320,
        }
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for Bitrate {
    type Err = AudioripError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let digits = normalized.strip_suffix('k').unwrap_or(&normalized);
        Bitrate::ALL
            .into_iter()
            .find(|b| b.kbps().to_string() == digits)
            .ok_or_else(|| {
                AudioripError::InvalidRequest(format!(
                    "Invalid audio quality '{}'. Valid values: 128k, 192k, 256k, 320k",
                    s
                ))
            })
    }
}

/// User choices for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionProfile {
    pub quality: Bitrate,
    /// Name of the output file; a timestamped name is used when absent
    pub filename: Option<String>,
    /// Also write a persistent notification when the job finishes
    pub notify_on_complete: bool,
}

impl Default for ConversionProfile {
    fn default() -> Self {
        Self {
            quality: Bitrate::default(),
            filename: None,
            notify_on_complete: true,
        }
    }
}

/// Immutable input of a single runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub bitrate: Bitrate,
}

/// Identifies the job currently owned by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Resolution,
    DirectoryCreation,
    InvalidRequest,
    TranscodeFailure,
    TranscoderUnavailable,
    Timeout,
    JobInProgress,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Resolution => "ResolutionError",
            FailureKind::DirectoryCreation => "DirectoryCreationError",
            FailureKind::InvalidRequest => "InvalidRequest",
            FailureKind::TranscodeFailure => "TranscodeFailure",
            FailureKind::TranscoderUnavailable => "TranscoderUnavailable",
            FailureKind::Timeout => "Timeout",
            FailureKind::JobInProgress => "JobInProgress",
        };
        f.write_str(name)
    }
}

/// Terminal result of a request. Produced once and handed off once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success { path: PathBuf },
    Failure { kind: FailureKind, reason: String },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success { .. })
    }

    /// Short message shown to the user
    pub fn message(&self) -> String {
        match self {
            ConversionOutcome::Success { path } => {
                format!("Conversion successful! File saved at: {}", path.display())
            }
            ConversionOutcome::Failure { kind, reason } => {
                format!("Conversion failed ({}): {}", kind, reason)
            }
        }
    }
}

impl From<AudioripError> for ConversionOutcome {
    fn from(err: AudioripError) -> Self {
        ConversionOutcome::Failure {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}
