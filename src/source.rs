//! Source selection and resolution.
//!
//! A picker yields an opaque [`SourceHandle`]; the [`SourceResolver`] turns it
//! into a local file the transcoder can read, copying it to a temporary file
//! when the handle cannot be used in place. The copy lives exactly as long as
//! the returned [`ResolvedSource`].

use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::{AudioripError, Result};

/// Something that lets the user choose a video
pub trait FilePicker {
    /// `None` when nothing was selected
    fn pick(&self) -> Option<SourceHandle>;
}

/// Picker backed by a command line argument
#[derive(Debug, Clone, Default)]
pub struct ArgumentPicker {
    input: Option<String>,
}

impl ArgumentPicker {
    pub fn new(input: Option<String>) -> Self {
        Self { input }
    }
}

impl FilePicker for ArgumentPicker {
    fn pick(&self) -> Option<SourceHandle> {
        self.input
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SourceHandle::parse)
    }
}

/// Opaque reference to the user-selected media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHandle {
    /// Local path, given directly or as a `file://` URI
    Path(PathBuf),
    /// Standard input (`-`)
    Stdin,
    /// Any other URI scheme
    Uri(String),
}

impl SourceHandle {
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            return SourceHandle::Stdin;
        }
        if let Some(rest) = raw.strip_prefix("file://") {
            // Only local authorities map to a path; remote hosts stay URIs
            let local = rest.strip_prefix("localhost").unwrap_or(rest);
            return if local.starts_with('/') {
                SourceHandle::Path(PathBuf::from(percent_decode(local)))
            } else {
                SourceHandle::Uri(raw.to_string())
            };
        }
        match raw.split_once("://") {
            Some((scheme, _)) if is_scheme(scheme) => SourceHandle::Uri(raw.to_string()),
            _ => SourceHandle::Path(PathBuf::from(raw)),
        }
    }

    /// File extension hint used for temporary copies
    fn extension(&self) -> Option<String> {
        match self {
            SourceHandle::Path(path) => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceHandle::Path(path) => write!(f, "{}", path.display()),
            SourceHandle::Stdin => f.write_str("<stdin>"),
            SourceHandle::Uri(uri) => f.write_str(uri),
        }
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                decoded.push(value);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// A local file ready for the transcoder.
///
/// Temporary copies are deleted when this value is dropped.
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl ResolvedSource {
    fn in_place(path: PathBuf) -> Self {
        Self { path, temp: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Remove the temporary copy, if any. Failures are only logged.
    pub fn cleanup(self) {
        if let Some(temp) = self.temp {
            let path = temp.to_path_buf();
            match temp.close() {
                Ok(()) => debug!("Removed temporary source copy {}", path.display()),
                Err(e) => warn!("Failed to remove temporary source copy {}: {}", path.display(), e),
            }
        }
    }
}

pub struct SourceResolver {
    config: SourceConfig,
}

impl SourceResolver {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Turn a handle into a readable local file
    pub async fn resolve(&self, handle: &SourceHandle) -> Result<ResolvedSource> {
        info!("Resolving source {}", handle);

        match handle {
            SourceHandle::Path(path) => self.resolve_path(handle, path).await,
            SourceHandle::Stdin => self.materialize(handle, tokio::io::stdin()).await,
            SourceHandle::Uri(uri) => Err(AudioripError::Resolution(format!(
                "Unsupported source URI: {}",
                uri
            ))),
        }
    }

    async fn resolve_path(&self, handle: &SourceHandle, path: &Path) -> Result<ResolvedSource> {
        let metadata = fs::metadata(path).await.map_err(|e| {
            AudioripError::Resolution(format!("Cannot open {}: {}", path.display(), e))
        })?;

        if metadata.is_dir() {
            return Err(AudioripError::Resolution(format!(
                "{} is a directory",
                path.display()
            )));
        }

        let file = fs::File::open(path).await.map_err(|e| {
            AudioripError::Resolution(format!("Cannot open {}: {}", path.display(), e))
        })?;

        if metadata.is_file() {
            if metadata.len() == 0 {
                return Err(AudioripError::Resolution(format!(
                    "{} is empty",
                    path.display()
                )));
            }
            if !self.config.always_copy {
                debug!("Using {} in place", path.display());
                return Ok(ResolvedSource::in_place(path.to_path_buf()));
            }
        }

        // Pipes, devices, or forced copies
        self.materialize(handle, file).await
    }

    async fn materialize<R>(&self, handle: &SourceHandle, mut reader: R) -> Result<ResolvedSource>
    where
        R: AsyncRead + Unpin,
    {
        let suffix = handle
            .extension()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix("audiorip-").suffix(&suffix);
        let named = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| AudioripError::Resolution(format!("Cannot create temporary copy: {}", e)))?;

        // From here on the copy is removed on every exit path
        let temp = named.into_temp_path();

        let mut writer = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&temp)
            .await
            .map_err(|e| AudioripError::Resolution(format!("Cannot write temporary copy: {}", e)))?;

        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| AudioripError::Resolution(format!("Cannot copy {}: {}", handle, e)))?;
        writer
            .flush()
            .await
            .map_err(|e| AudioripError::Resolution(format!("Cannot copy {}: {}", handle, e)))?;

        if copied == 0 {
            return Err(AudioripError::Resolution(format!("{} is empty", handle)));
        }

        info!("Copied {} bytes from {} to {}", copied, handle, temp.display());

        Ok(ResolvedSource {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }
}
