use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, AudioripError};
use crate::job::{ConversionOutcome, ConversionProfile, ConversionRequest};
use crate::media::{Transcoder, TranscoderFactory};
use crate::notify::{ConsoleNotifier, NotificationLog, Notifier, NotifierSet};
use crate::output::{normalize_filename, OutputPlanner};
use crate::runner::{JobRunner, PendingJob};
use crate::source::{FilePicker, SourceHandle, SourceResolver};

/// Wires picker, resolver, planner, runner and notifiers into one flow
pub struct Workflow {
    resolver: SourceResolver,
    planner: OutputPlanner,
    runner: JobRunner,
    notifiers: NotifierSet,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let transcoder = TranscoderFactory::create_transcoder(config.transcoder.clone());
        let persistent = Box::new(NotificationLog::new(config.notify.log_path.clone()));
        Self::with_parts(config, transcoder, Box::new(ConsoleNotifier), persistent)
    }

    /// `toast` hears about every outcome, `persistent` only when the
    /// profile asks for a completion notification
    pub fn with_parts(
        config: Config,
        transcoder: Arc<dyn Transcoder>,
        toast: Box<dyn Notifier>,
        persistent: Box<dyn Notifier>,
    ) -> Self {
        let timeout = config.timeout();
        Self {
            resolver: SourceResolver::new(config.source),
            planner: OutputPlanner::new(config.output.music_dir),
            runner: JobRunner::new(transcoder, timeout),
            notifiers: NotifierSet::new().with(toast).with_opt_in(persistent),
        }
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Version line of the configured transcoder
    pub async fn check_transcoder(&self) -> Result<String> {
        let version = self.runner.transcoder().version_info().await?;
        info!("{} is available: {}", self.runner.transcoder().name(), version);
        Ok(version)
    }

    /// Validate, resolve, plan and submit. Does not notify.
    pub async fn start(
        &self,
        picked: Option<SourceHandle>,
        profile: &ConversionProfile,
    ) -> Result<PendingJob> {
        let handle = picked
            .ok_or_else(|| AudioripError::InvalidRequest("No video selected".to_string()))?;

        if let Some(filename) = &profile.filename {
            normalize_filename(filename)?;
        }

        // Cheap early rejection; the runner makes the binding decision
        if let Some(job) = self.runner.running_job() {
            return Err(AudioripError::JobInProgress(job.id));
        }

        let source = self.resolver.resolve(&handle).await?;
        if source.is_temporary() {
            debug!("Converting from temporary copy {}", source.path().display());
        }
        let destination = self.planner.plan(profile.filename.as_deref()).await?;

        let request = ConversionRequest {
            source_path: source.path().to_path_buf(),
            destination_path: destination,
            bitrate: profile.quality,
        };

        self.runner.submit(request, source).await
    }

    /// Run one conversion to its terminal outcome and notify about it
    pub async fn convert(
        &self,
        picked: Option<SourceHandle>,
        profile: &ConversionProfile,
    ) -> ConversionOutcome {
        let outcome = match self.start(picked, profile).await {
            Ok(pending) => {
                info!("Waiting for job {}", pending.handle().id);
                pending.wait().await
            }
            Err(e) => return self.reject(e, profile),
        };

        self.deliver(&outcome, profile);
        outcome
    }

    /// Report a request that failed before it could be submitted
    pub fn reject(&self, err: AudioripError, profile: &ConversionProfile) -> ConversionOutcome {
        warn!("Conversion rejected: {}", err);
        let outcome = ConversionOutcome::from(err);
        self.deliver(&outcome, profile);
        outcome
    }

    /// Same as [`Workflow::convert`] with the source taken from a picker
    pub async fn convert_from(
        &self,
        picker: &dyn FilePicker,
        profile: &ConversionProfile,
    ) -> ConversionOutcome {
        self.convert(picker.pick(), profile).await
    }

    fn deliver(&self, outcome: &ConversionOutcome, profile: &ConversionProfile) {
        self.notifiers.deliver(outcome, profile.notify_on_complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Bitrate, FailureKind};
    use crate::notify::MockNotifier;
    use crate::runner::tests::FakeTranscoder;
    use crate::source::ArgumentPicker;
    use assert_fs::prelude::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config(temp: &assert_fs::TempDir) -> Config {
        let mut config = Config::default();
        config.output.music_dir = temp.child("Music").path().to_path_buf();
        config.source.temp_dir = Some(temp.path().to_path_buf());
        config.notify.log_path = temp.child("notifications.jsonl").path().to_path_buf();
        config
    }

    fn expect_once(outcome: ConversionOutcome) -> Box<MockNotifier> {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(move |seen| *seen == outcome)
            .times(1)
            .return_const(());
        Box::new(notifier)
    }

    fn expect_failure(kind: FailureKind) -> Box<MockNotifier> {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(move |seen| matches!(seen, ConversionOutcome::Failure { kind: k, .. } if *k == kind))
            .times(1)
            .return_const(());
        Box::new(notifier)
    }

    fn never() -> Box<MockNotifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        Box::new(notifier)
    }

    fn movie(temp: &assert_fs::TempDir) -> SourceHandle {
        let movie = temp.child("movie.mp4");
        movie.write_str("frames").unwrap();
        SourceHandle::Path(movie.path().to_path_buf())
    }

    fn profile(quality: Bitrate, filename: Option<&str>, notify_on_complete: bool) -> ConversionProfile {
        ConversionProfile {
            quality,
            filename: filename.map(str::to_string),
            notify_on_complete,
        }
    }

    #[tokio::test]
    async fn test_successful_conversion_notifies_both() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(&temp);
        let expected = ConversionOutcome::Success {
            path: config.output.music_dir.join("song.mp3"),
        };
        let workflow = Workflow::with_parts(
            config.clone(),
            Arc::new(FakeTranscoder::succeeding("mp3 bytes")),
            expect_once(expected.clone()),
            expect_once(expected.clone()),
        );

        let outcome = workflow
            .convert(Some(movie(&temp)), &profile(Bitrate::K128, Some("song"), true))
            .await;

        assert_eq!(outcome, expected);
        temp.child("Music").child("song.mp3").assert("mp3 bytes");
    }

    #[tokio::test]
    async fn test_unreadable_source_never_reaches_transcoder() {
        let temp = assert_fs::TempDir::new().unwrap();
        let transcoder = Arc::new(FakeTranscoder::succeeding("unused"));
        let workflow = Workflow::with_parts(
            config(&temp),
            transcoder.clone(),
            expect_failure(FailureKind::Resolution),
            expect_failure(FailureKind::Resolution),
        );

        let missing = SourceHandle::Path(temp.child("gone.mp4").path().to_path_buf());
        let outcome = workflow
            .convert(Some(missing), &profile(Bitrate::K320, Some("song"), true))
            .await;

        match outcome {
            ConversionOutcome::Failure { kind, .. } => assert_eq!(kind.to_string(), "ResolutionError"),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(transcoder.runs(), 0);
    }

    #[tokio::test]
    async fn test_transcoder_failure_leaves_no_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        let workflow = Workflow::with_parts(
            config(&temp),
            Arc::new(FakeTranscoder::failing(1, "Conversion failed!")),
            expect_failure(FailureKind::TranscodeFailure),
            never(),
        );

        let outcome = workflow
            .convert(Some(movie(&temp)), &profile(Bitrate::K192, Some("song"), false))
            .await;

        assert!(matches!(
            outcome,
            ConversionOutcome::Failure { kind: FailureKind::TranscodeFailure, ref reason } if reason.contains("exit code 1")
        ));
        assert!(!temp.child("Music").child("song.mp3").path().exists());
    }

    #[tokio::test]
    async fn test_missing_selection_and_empty_filename_are_invalid() {
        let temp = assert_fs::TempDir::new().unwrap();
        let transcoder = Arc::new(FakeTranscoder::succeeding("unused"));
        let workflow = Workflow::with_parts(
            config(&temp),
            transcoder.clone(),
            Box::new({
                let mut notifier = MockNotifier::new();
                notifier
                    .expect_notify()
                    .withf(|seen| matches!(seen, ConversionOutcome::Failure { kind: FailureKind::InvalidRequest, .. }))
                    .times(2)
                    .return_const(());
                notifier
            }),
            never(),
        );

        let nothing = workflow
            .convert_from(&ArgumentPicker::new(None), &profile(Bitrate::K320, None, false))
            .await;
        assert!(nothing.message().contains("No video selected"));

        let empty = workflow
            .convert(Some(movie(&temp)), &profile(Bitrate::K320, Some("   "), false))
            .await;
        assert!(empty.message().contains("Filename cannot be empty"));
        assert_eq!(transcoder.runs(), 0);
    }

    #[tokio::test]
    async fn test_rejected_quality_is_reported_once() {
        let temp = assert_fs::TempDir::new().unwrap();
        let transcoder = Arc::new(FakeTranscoder::succeeding("unused"));
        let workflow = Workflow::with_parts(
            config(&temp),
            transcoder.clone(),
            expect_failure(FailureKind::InvalidRequest),
            expect_failure(FailureKind::InvalidRequest),
        );

        let err = "64k".parse::<Bitrate>().unwrap_err();
        let outcome = workflow.reject(err, &profile(Bitrate::K320, Some("song"), true));

        assert!(matches!(
            outcome,
            ConversionOutcome::Failure { kind: FailureKind::InvalidRequest, ref reason } if reason.contains("64k")
        ));
        assert_eq!(transcoder.runs(), 0);
        assert!(!temp.child("Music").path().exists());
    }

    #[tokio::test]
    async fn test_default_filename_is_timestamped() {
        let temp = assert_fs::TempDir::new().unwrap();
        let workflow = Workflow::with_parts(
            config(&temp),
            Arc::new(FakeTranscoder::succeeding("mp3 bytes")),
            Box::new({
                let mut notifier = MockNotifier::new();
                notifier.expect_notify().times(1).return_const(());
                notifier
            }),
            never(),
        );

        let outcome = workflow
            .convert(Some(movie(&temp)), &profile(Bitrate::K320, None, false))
            .await;

        let path = match outcome {
            ConversionOutcome::Success { path } => path,
            other => panic!("expected success, got {:?}", other),
        };
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("converted_") && name.ends_with(".mp3"));
        assert_eq!(path.parent().unwrap(), temp.child("Music").path());
    }

    #[tokio::test]
    async fn test_busy_workflow_rejects_second_conversion() {
        let temp = assert_fs::TempDir::new().unwrap();
        let workflow = Workflow::with_parts(
            config(&temp),
            Arc::new(FakeTranscoder::succeeding("first").with_delay(Duration::from_millis(300))),
            expect_failure(FailureKind::JobInProgress),
            never(),
        );

        let first = workflow
            .start(Some(movie(&temp)), &profile(Bitrate::K128, Some("song"), false))
            .await
            .unwrap();

        let second = workflow
            .convert(Some(movie(&temp)), &profile(Bitrate::K320, Some("song"), false))
            .await;
        assert!(matches!(
            second,
            ConversionOutcome::Failure { kind: FailureKind::JobInProgress, .. }
        ));

        let expected = PathBuf::from(temp.child("Music").child("song.mp3").path());
        assert_eq!(first.wait().await, ConversionOutcome::Success { path: expected });
        temp.child("Music").child("song.mp3").assert("first");
    }
}
