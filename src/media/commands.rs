use std::ffi::OsString;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, AudioripError};
use crate::job::{Bitrate, ConversionRequest};

/// Transcoder invocation as a program plus a discrete argument vector.
///
/// Arguments are never joined into a shell string; each element reaches the
/// process as exactly one argv entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<OsString>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().as_os_str())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().as_os_str())
    }

    /// Set audio bitrate
    pub fn audio_bitrate(self, bitrate: Bitrate) -> Self {
        self.arg("-b:a").arg(bitrate.as_arg())
    }

    /// Render for logs; quoting here is cosmetic and never executed
    pub fn display_line(&self) -> String {
        let mut line = self.binary_path.clone();
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            line.push(' ');
            if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || "'\"\\;&|$`<>(){}*?!#~".contains(c)) {
                line.push('\'');
                line.push_str(&arg.replace('\'', "'\\''"));
                line.push('\'');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

/// Builder for transcoder invocations
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build the MP3 extraction command: `-i <input> -b:a <bitrate> [extra] <output>`
    pub fn extract_mp3(
        &self,
        request: &ConversionRequest,
        additional_options: &[String],
    ) -> Result<MediaCommand> {
        Self::validate(request)?;

        let command = MediaCommand::new(&self.binary_path, "MP3 extraction")
            .input(&request.source_path)
            .audio_bitrate(request.bitrate)
            .args(additional_options.iter().map(OsString::from))
            .output(&request.destination_path);

        debug!("Built command: {}", command.display_line());
        Ok(command)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check")
            .arg("-version")
    }

    fn validate(request: &ConversionRequest) -> Result<()> {
        if request.source_path.as_os_str().is_empty() {
            return Err(AudioripError::InvalidRequest("No source selected".to_string()));
        }
        if !request.source_path.exists() {
            return Err(AudioripError::InvalidRequest(format!(
                "Source {} does not exist",
                request.source_path.display()
            )));
        }
        if request.source_path == request.destination_path {
            return Err(AudioripError::InvalidRequest(
                "Source and destination are the same file".to_string(),
            ));
        }

        let is_mp3 = request
            .destination_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if !is_mp3 {
            return Err(AudioripError::InvalidRequest(format!(
                "Destination {} is not an .mp3 file",
                request.destination_path.display()
            )));
        }

        match request.destination_path.parent() {
            Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => Ok(()),
            _ => Err(AudioripError::InvalidRequest(format!(
                "Destination directory for {} does not exist",
                request.destination_path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::path::PathBuf;

    fn request(temp: &assert_fs::TempDir, filename: &str, bitrate: Bitrate) -> ConversionRequest {
        let movie = temp.child("movie.mp4");
        movie.write_str("frames").unwrap();
        ConversionRequest {
            source_path: movie.path().to_path_buf(),
            destination_path: temp.path().join(filename),
            bitrate,
        }
    }

    #[test]
    fn test_extract_mp3_argument_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "song.mp3", Bitrate::K128);

        let command = MediaCommandBuilder::new("ffmpeg").extract_mp3(&request, &[]).unwrap();

        assert_eq!(command.binary_path, "ffmpeg");
        assert_eq!(
            command.args,
            vec![
                OsString::from("-i"),
                request.source_path.clone().into_os_string(),
                OsString::from("-b:a"),
                OsString::from("128k"),
                request.destination_path.clone().into_os_string(),
            ]
        );
    }

    #[test]
    fn test_extra_options_precede_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "song.mp3", Bitrate::K320);
        let extra = vec!["-ar".to_string(), "44100".to_string()];

        let command = MediaCommandBuilder::new("ffmpeg").extract_mp3(&request, &extra).unwrap();

        assert_eq!(command.args.len(), 7);
        assert_eq!(command.args[4], OsString::from("-ar"));
        assert_eq!(command.args[5], OsString::from("44100"));
        assert_eq!(command.args[6], request.destination_path.as_os_str());
    }

    #[test]
    fn test_shell_metacharacters_stay_in_one_argument() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "song; rm -rf ~.mp3", Bitrate::K192);

        let command = MediaCommandBuilder::new("ffmpeg").extract_mp3(&request, &[]).unwrap();

        assert_eq!(command.args.len(), 5);
        let output = command.args.last().unwrap().to_string_lossy().to_string();
        assert!(output.ends_with("song; rm -rf ~.mp3"));
        assert!(!command.args.iter().any(|a| a == "rm" || a == "-rf"));
        assert!(command.display_line().contains("'"));
    }

    #[test]
    fn test_validation_failures() {
        let temp = assert_fs::TempDir::new().unwrap();
        let builder = MediaCommandBuilder::new("ffmpeg");

        let mut missing_source = request(&temp, "song.mp3", Bitrate::K320);
        missing_source.source_path = temp.path().join("nope.mp4");

        let mut same_file = request(&temp, "song.mp3", Bitrate::K320);
        same_file.destination_path = same_file.source_path.clone();

        let wrong_extension = request(&temp, "song.wav", Bitrate::K320);

        let mut missing_dir = request(&temp, "song.mp3", Bitrate::K320);
        missing_dir.destination_path = temp.path().join("absent").join("song.mp3");

        let mut empty_source = request(&temp, "song.mp3", Bitrate::K320);
        empty_source.source_path = PathBuf::new();

        for bad in [missing_source, same_file, wrong_extension, missing_dir, empty_source] {
            assert!(matches!(
                builder.extract_mp3(&bad, &[]),
                Err(AudioripError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_display_line_quotes() {
        let command = MediaCommand::new("ffmpeg", "test")
            .arg("-i")
            .arg("it's here.mp4");
        assert_eq!(command.display_line(), "ffmpeg -i 'it'\\''s here.mp4'");
        assert_eq!(MediaCommandBuilder::new("ffmpeg").version_check().display_line(), "ffmpeg -version");
    }
}
