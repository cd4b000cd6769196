use std::path::{Path, PathBuf};
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AudioripError, Result};

const MP3_EXTENSION: &str = "mp3";

/// Timestamped name used when the user did not choose one
pub fn default_filename() -> String {
    format!("converted_{}.{}", Utc::now().timestamp_millis(), MP3_EXTENSION)
}

/// Validate a user-chosen name and give it the `.mp3` extension
pub fn normalize_filename(raw: &str) -> Result<String> {
    let name = raw.trim();
    // A bare extension names nothing
    if name.is_empty() || name.eq_ignore_ascii_case(".mp3") {
        return Err(AudioripError::InvalidRequest("Filename cannot be empty".to_string()));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(AudioripError::InvalidRequest(format!(
            "Filename '{}' must not contain path components",
            name
        )));
    }
    if name.contains('\0') {
        return Err(AudioripError::InvalidRequest("Filename contains a NUL byte".to_string()));
    }

    let has_extension = Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MP3_EXTENSION));

    if has_extension {
        Ok(name.to_string())
    } else {
        Ok(format!("{}.{}", name, MP3_EXTENSION))
    }
}

/// Delete a previous file at `path`; conversions always overwrite.
///
/// Returns whether a file was removed.
pub async fn remove_existing(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => {
            info!("Removed existing file {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AudioripError::Io(e)),
    }
}

/// Computes where converted files are written
pub struct OutputPlanner {
    directory: PathBuf,
}

impl OutputPlanner {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Ensure the directory exists and return the destination for `filename`.
    ///
    /// An existing file at the destination is left alone; the runner removes
    /// it once the job has been admitted.
    pub async fn plan(&self, filename: Option<&str>) -> Result<PathBuf> {
        let filename = match filename {
            Some(raw) => normalize_filename(raw)?,
            None => default_filename(),
        };

        if !fs::try_exists(&self.directory).await.unwrap_or(false) {
            info!("Creating output directory {}", self.directory.display());
        }
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| AudioripError::DirectoryCreation {
                path: self.directory.clone(),
                reason: e.to_string(),
            })?;

        let path = self.directory.join(filename);
        debug!("Planned output {}", path.display());
        Ok(path)
    }
}
