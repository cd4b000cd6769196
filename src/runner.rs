//! Single-slot job runner.
//!
//! At most one conversion is in flight. A submission made while another job
//! is running is rejected before it touches anything on disk. The outcome of
//! an admitted job is delivered once, through [`PendingJob::wait`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{AudioripError, Result};
use crate::job::{ConversionOutcome, ConversionRequest, FailureKind, JobHandle};
use crate::media::{MediaCommand, Transcoder};
use crate::output::remove_existing;
use crate::source::ResolvedSource;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunnerState {
    #[default]
    Idle,
    Running(JobHandle),
    Completed {
        job: JobHandle,
        outcome: ConversionOutcome,
    },
}

impl RunnerState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunnerState::Running(_))
    }
}

/// An admitted job whose outcome has not been observed yet
#[derive(Debug)]
pub struct PendingJob {
    handle: JobHandle,
    receiver: oneshot::Receiver<ConversionOutcome>,
}

impl PendingJob {
    pub fn handle(&self) -> JobHandle {
        self.handle
    }

    /// Wait for the terminal outcome
    pub async fn wait(self) -> ConversionOutcome {
        self.receiver.await.unwrap_or_else(|_| ConversionOutcome::Failure {
            kind: FailureKind::TranscodeFailure,
            reason: "Job ended without reporting a result".to_string(),
        })
    }
}

pub struct JobRunner {
    transcoder: Arc<dyn Transcoder>,
    timeout: Option<Duration>,
    state: Arc<Mutex<RunnerState>>,
}

fn lock(state: &Mutex<RunnerState>) -> MutexGuard<'_, RunnerState> {
    // A panic while holding the lock cannot leave the enum half-written
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobRunner {
    pub fn new(transcoder: Arc<dyn Transcoder>, timeout: Option<Duration>) -> Self {
        Self {
            transcoder,
            timeout,
            state: Arc::new(Mutex::new(RunnerState::Idle)),
        }
    }

    pub fn state(&self) -> RunnerState {
        lock(&self.state).clone()
    }

    /// Job currently owned by the runner, if any
    pub fn running_job(&self) -> Option<JobHandle> {
        match &*lock(&self.state) {
            RunnerState::Running(job) => Some(*job),
            _ => None,
        }
    }

    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.transcoder
    }

    /// Admit `request` and start the transcoder in the background.
    ///
    /// `source` is kept alive until the transcoder exits, then cleaned up.
    /// Fails with `JobInProgress` when another job is running; in that case
    /// nothing on disk is modified.
    pub async fn submit(&self, request: ConversionRequest, source: ResolvedSource) -> Result<PendingJob> {
        let command = self.transcoder.build_command(&request)?;
        let handle = self.admit()?;

        info!(
            "Job {} admitted: {} -> {} at {}",
            handle.id,
            request.source_path.display(),
            request.destination_path.display(),
            request.bitrate
        );

        if let Err(e) = remove_existing(&request.destination_path).await {
            self.release(handle);
            return Err(e);
        }

        let (sender, receiver) = oneshot::channel();
        let transcoder = Arc::clone(&self.transcoder);
        let state = Arc::clone(&self.state);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let outcome = execute(transcoder.as_ref(), handle, &command, timeout, &request).await;

            source.cleanup();
            if !outcome.is_success() {
                discard_partial_output(&request.destination_path).await;
            }

            match &outcome {
                ConversionOutcome::Success { path } => {
                    info!("Job {} completed: {}", handle.id, path.display())
                }
                ConversionOutcome::Failure { kind, reason } => {
                    warn!("Job {} failed ({}): {}", handle.id, kind, reason)
                }
            }

            *lock(&state) = RunnerState::Completed {
                job: handle,
                outcome: outcome.clone(),
            };

            if sender.send(outcome).is_err() {
                debug!("Nobody is waiting for job {}", handle.id);
            }
        });

        Ok(PendingJob { handle, receiver })
    }

    fn admit(&self) -> Result<JobHandle> {
        let mut state = lock(&self.state);
        if let RunnerState::Running(current) = &*state {
            warn!("Rejecting submission, job {} is still running", current.id);
            return Err(AudioripError::JobInProgress(current.id));
        }
        let handle = JobHandle::new();
        *state = RunnerState::Running(handle);
        Ok(handle)
    }

    fn release(&self, handle: JobHandle) {
        let mut state = lock(&self.state);
        if *state == RunnerState::Running(handle) {
            *state = RunnerState::Idle;
        }
    }
}

async fn execute(
    transcoder: &dyn Transcoder,
    handle: JobHandle,
    command: &MediaCommand,
    timeout: Option<Duration>,
    request: &ConversionRequest,
) -> ConversionOutcome {
    let run = transcoder.run(handle, command);
    let completion = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            // Dropping the run future stops the transcoder process
            Err(_) => Err(AudioripError::Timeout(limit)),
        },
        None => run.await,
    };

    match completion {
        Ok(completion) if completion.succeeded() => {
            let produced = tokio::fs::try_exists(&request.destination_path)
                .await
                .unwrap_or(false);
            if !produced {
                warn!(
                    "{} reported success but {} is missing",
                    transcoder.name(),
                    request.destination_path.display()
                );
            }
            ConversionOutcome::Success {
                path: request.destination_path.clone(),
            }
        }
        Ok(completion) => AudioripError::TranscodeFailure {
            code: completion.return_code,
            diagnostics: completion.diagnostics,
        }
        .into(),
        Err(e) => e.into(),
    }
}

async fn discard_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
