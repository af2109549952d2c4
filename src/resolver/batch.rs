//! Batch resolution jobs.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatch::SideEffect;
use super::{ResolutionRequest, ResolutionResult, Resolver};
use crate::error::{ExecutionError, ResolveResult, ValidationError};
use crate::events::Event;

/// Unique identifier for a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle. `Completed` is terminal; there is no failed state, a job
/// with errors still completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet started.
    #[default]
    Pending,
    /// Resolving requests.
    Processing,
    /// Every request has a result or an error. Terminal.
    Completed,
}

impl JobStatus {
    /// The wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    /// Returns true once no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Only `pending -> processing -> completed` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing) | (Self::Processing, Self::Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResolutionJob {
    /// Job identifier.
    #[serde(rename = "job_id")]
    pub id: JobId,
    /// Lifecycle status.
    pub status: JobStatus,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// Set when processing starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Requests attempted so far, advanced per chunk.
    pub progress: usize,
    /// Number of requests in the batch.
    pub total: usize,
    /// Successful resolutions, in request order.
    #[serde(default)]
    pub results: Vec<ResolutionResult>,
    /// One line per failed request.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl BatchResolutionJob {
    /// A pending job for `total` requests.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0,
            total,
            results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Moves to `next`, stamping the start or completion time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` for anything but
    /// `pending -> processing -> completed`.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        if next == JobStatus::Processing {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// Every request is accounted for as a result or an error.
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        self.results.len() + self.errors.len() == self.total
    }
}

/// Cooperative cancellation flag shared with a running batch.
///
/// Checked once per chunk boundary; a chunk in flight always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; seen at the next chunk boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Resolver {
    /// Resolves `requests` as one job on the calling thread.
    ///
    /// Individual failures go to the job's error list and never stop the
    /// batch. The returned job is completed and reconciled.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the job cannot be created, or
    /// `Cancelled` if `cancel` fired at a chunk boundary; the job is then
    /// left in `processing` and can be read back with [`Resolver::get_job`].
    pub fn run_batch(
        &self,
        requests: &[ResolutionRequest],
        cancel: &CancellationToken,
    ) -> ResolveResult<BatchResolutionJob> {
        let job = BatchResolutionJob::new(requests.len());
        self.jobs.create_job(&job)?;
        self.execute_batch(job, requests, cancel)
    }

    /// Persists a pending job and resolves it on a background thread.
    ///
    /// Poll [`Resolver::get_job`] with the returned ID for progress.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the job cannot be created, or
    /// `WorkerUnavailable` if the thread cannot be spawned.
    pub fn start_batch(
        self: &Arc<Self>,
        requests: Vec<ResolutionRequest>,
        cancel: CancellationToken,
    ) -> ResolveResult<JobId> {
        let job = BatchResolutionJob::new(requests.len());
        let job_id = job.id;
        self.jobs.create_job(&job)?;

        let resolver = Arc::clone(self);
        thread::Builder::new()
            .name(format!("entity-resolution-batch-{job_id}"))
            .spawn(move || {
                if let Err(error) = resolver.execute_batch(job, &requests, &cancel) {
                    warn!(%job_id, %error, "background batch stopped early");
                }
            })
            .map_err(|e| ExecutionError::WorkerUnavailable {
                message: format!("failed to spawn batch worker: {e}"),
            })?;

        Ok(job_id)
    }

    /// Reads a persisted job snapshot.
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` for an unknown ID, or the store's error.
    pub fn get_job(&self, job_id: JobId) -> ResolveResult<BatchResolutionJob> {
        self.jobs
            .get_job(job_id)?
            .ok_or_else(|| ExecutionError::JobNotFound { id: job_id }.into())
    }

    fn execute_batch(
        &self,
        mut job: BatchResolutionJob,
        requests: &[ResolutionRequest],
        cancel: &CancellationToken,
    ) -> ResolveResult<BatchResolutionJob> {
        job.transition(JobStatus::Processing)?;
        self.save_job(&job);
        self.publish_status(&job);
        info!(job_id = %job.id, total = job.total, "batch resolution started");

        let chunk_size = self.config.batch_size.max(1);
        for (chunk_index, chunk) in requests.chunks(chunk_size).enumerate() {
            if cancel.is_cancelled() {
                job.errors.push(format!(
                    "batch cancelled after {} of {} requests",
                    job.progress, job.total
                ));
                self.save_job(&job);
                warn!(job_id = %job.id, processed = job.progress, total = job.total, "batch cancelled");
                return Err(ExecutionError::Cancelled {
                    job_id: job.id,
                    processed: job.progress,
                    total: job.total,
                }
                .into());
            }

            for (offset, request) in chunk.iter().enumerate() {
                let index = chunk_index * chunk_size + offset;
                match self.resolve(request) {
                    Ok(result) => job.results.push(result),
                    Err(error) => {
                        debug!(job_id = %job.id, index, %error, "request failed");
                        job.errors.push(format!("request {index}: {error}"));
                    }
                }
            }

            job.progress += chunk.len();
            self.save_job(&job);
            debug!(job_id = %job.id, progress = job.progress, total = job.total, "chunk done");
        }

        debug_assert!(job.is_reconciled());
        job.transition(JobStatus::Completed)?;
        self.save_job(&job);
        self.publish_status(&job);
        info!(
            job_id = %job.id,
            total = job.total,
            successful = job.results.len(),
            errors = job.errors.len(),
            "batch resolution completed"
        );
        Ok(job)
    }

    fn save_job(&self, job: &BatchResolutionJob) {
        if let Err(error) = self.jobs.update_job(job) {
            warn!(job_id = %job.id, %error, "failed to persist job progress");
        }
    }

    fn publish_status(&self, job: &BatchResolutionJob) {
        self.dispatcher
            .submit(SideEffect::Event(Box::new(Event::batch_status(job))));
    }
}
