use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use sqlx::Type;

use crate::{tasks::WorkerTask, traits::FulfillmentError};

/// Lifecycle of a queued job. `Dead` is the dead-letter state a job reaches after exhausting its
/// retry budget; dead jobs are kept for manual inspection, never re-claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type)]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Dead,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "Queued"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Done => write!(f, "Done"),
            JobStatus::Dead => write!(f, "Dead"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = crate::db_types::ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(Self::Queued),
            "Running" => Ok(Self::Running),
            "Done" => Ok(Self::Done),
            "Dead" => Ok(Self::Dead),
            _ => Err(crate::db_types::ConversionError::new(format!("Invalid job status: {s}"))),
        }
    }
}

/// A job claimed from the queue: the idempotency key plus the ordered task list.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: String,
    pub tasks: Vec<WorkerTask>,
    pub status: JobStatus,
    pub attempts: i64,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Durable, at-least-once delivery of follow-up tasks. One job per order, keyed by the payment
/// reference; the key is the deduplication boundary, the second line of defense behind the
/// order↔payment uniqueness constraint.
#[allow(async_fn_in_trait)]
pub trait TaskQueue: Clone {
    /// Enqueues a job. Returns false (and changes nothing) if a job with this id already exists,
    /// whatever its state.
    async fn enqueue_job(&self, job_id: &str, tasks: &[WorkerTask]) -> Result<bool, FulfillmentError>;

    /// Atomically claims the oldest due `Queued` job, moving it to `Running` and bumping its
    /// attempt counter. Returns None when nothing is due.
    async fn claim_due_job(&self) -> Result<Option<QueuedJob>, FulfillmentError>;

    /// Marks a claimed job as done.
    async fn complete_job(&self, job_id: &str) -> Result<(), FulfillmentError>;

    /// Returns a claimed job to the queue with exponential backoff, or moves it to `Dead` once
    /// `max_attempts` is exhausted. Returns the resulting status.
    async fn retry_or_bury_job(
        &self,
        job_id: &str,
        max_attempts: i64,
        base_backoff: Duration,
    ) -> Result<JobStatus, FulfillmentError>;

    /// Requeues `Running` jobs whose worker evidently died: anything untouched for longer than
    /// `stale_after`. Returns the number of jobs recovered.
    async fn requeue_stale_jobs(&self, stale_after: Duration) -> Result<u64, FulfillmentError>;

    /// Fetches a job by id without claiming it.
    async fn fetch_job(&self, job_id: &str) -> Result<Option<QueuedJob>, FulfillmentError>;
}
