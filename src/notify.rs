use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::job::ConversionOutcome;

pub const NOTIFICATION_TITLE: &str = "MP4 to MP3 Conversion";

/// Receives terminal outcomes and shows them to the user
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, outcome: &ConversionOutcome);
}

/// Short message on stdout, the equivalent of a toast
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, outcome: &ConversionOutcome) {
        println!("{}", outcome.message());
    }
}

/// One persisted notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub title: String,
    pub message: String,
    pub success: bool,
    pub path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn from_outcome(outcome: &ConversionOutcome) -> Self {
        let path = match outcome {
            ConversionOutcome::Success { path } => Some(path.clone()),
            ConversionOutcome::Failure { .. } => None,
        };
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            message: outcome.message(),
            success: outcome.is_success(),
            path,
            timestamp: Utc::now(),
        }
    }
}

/// Persistent notifications appended to a JSON lines file
pub struct NotificationLog {
    path: PathBuf,
}

impl NotificationLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &NotificationRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let line = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Read back all records, skipping lines that do not parse
    pub fn read_all(&self) -> Result<Vec<NotificationRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, outcome: &ConversionOutcome) {
        let record = NotificationRecord::from_outcome(outcome);
        match self.append(&record) {
            Ok(()) => info!("Notification written to {}", self.path.display()),
            Err(e) => warn!("Failed to write notification to {}: {}", self.path.display(), e),
        }
    }
}

/// Notifiers an outcome is delivered to, in registration order.
///
/// Opt-in notifiers only hear about outcomes whose profile asked for a
/// completion notification.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<(Box<dyn Notifier>, bool)>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notifier told about every outcome
    pub fn with(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push((notifier, false));
        self
    }

    /// Add a notifier told only when completion notifications are wanted
    pub fn with_opt_in(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push((notifier, true));
        self
    }

    pub fn deliver(&self, outcome: &ConversionOutcome, notify_on_complete: bool) {
        for (notifier, opt_in) in &self.notifiers {
            if !opt_in || notify_on_complete {
                notifier.notify(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FailureKind;
    use assert_fs::prelude::*;
    use mockall::predicate::eq;

    #[test]
    fn test_notification_log_appends_records() {
        let temp = assert_fs::TempDir::new().unwrap();
        let log = NotificationLog::new(temp.child("state").child("notifications.jsonl").path());

        log.notify(&ConversionOutcome::Success { path: PathBuf::from("/music/song.mp3") });
        log.notify(&ConversionOutcome::Failure {
            kind: FailureKind::Timeout,
            reason: "Transcoding timed out after 5 seconds".to_string(),
        });

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, NOTIFICATION_TITLE);
        assert!(records[0].success);
        assert_eq!(records[0].path, Some(PathBuf::from("/music/song.mp3")));
        assert!(!records[1].success);
        assert!(records[1].message.contains("Timeout"));
    }

    #[test]
    fn test_read_all_missing_file_is_empty() {
        let temp = assert_fs::TempDir::new().unwrap();
        let log = NotificationLog::new(temp.child("none.jsonl").path());
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_unwritable_log_does_not_panic() {
        let temp = assert_fs::TempDir::new().unwrap();
        let blocker = temp.child("blocker");
        blocker.write_str("file").unwrap();

        let log = NotificationLog::new(blocker.path().join("notifications.jsonl"));
        log.notify(&ConversionOutcome::Success { path: PathBuf::from("song.mp3") });
        assert!(log.append(&NotificationRecord::from_outcome(&ConversionOutcome::Success {
            path: PathBuf::from("song.mp3"),
        }))
        .is_err());
    }

    #[test]
    fn test_notifier_set_fans_out() {
        let outcome = ConversionOutcome::Success { path: PathBuf::from("song.mp3") };

        let mut first = MockNotifier::new();
        first.expect_notify().with(eq(outcome.clone())).times(1).return_const(());
        let mut second = MockNotifier::new();
        second.expect_notify().with(eq(outcome.clone())).times(1).return_const(());

        let set = NotifierSet::new().with(Box::new(first)).with_opt_in(Box::new(second));
        set.deliver(&outcome, true);
    }

    #[test]
    fn test_notifier_set_skips_opt_in_when_not_requested() {
        let outcome = ConversionOutcome::Failure {
            kind: FailureKind::TranscodeFailure,
            reason: "Transcoding failed with exit code 1".to_string(),
        };

        let mut toast = MockNotifier::new();
        toast.expect_notify().with(eq(outcome.clone())).times(2).return_const(());
        let mut persistent = MockNotifier::new();
        persistent.expect_notify().times(0);

        let set = NotifierSet::new().with(Box::new(toast)).with_opt_in(Box::new(persistent));
        set.deliver(&outcome, false);
        set.deliver(&outcome, false);
    }
}
