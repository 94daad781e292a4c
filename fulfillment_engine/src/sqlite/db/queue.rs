use chrono::{DateTime, Duration, Utc};
use log::trace;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    traits::{FulfillmentError, JobStatus, QueuedJob},
    tasks::WorkerTask,
};

#[derive(Debug, FromRow)]
struct JobRow {
    job_id: String,
    tasks: String,
    status: JobStatus,
    attempts: i64,
    available_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<QueuedJob, FulfillmentError> {
        let tasks: Vec<WorkerTask> =
            serde_json::from_str(&self.tasks).map_err(|e| FulfillmentError::SerializationError(e.to_string()))?;
        Ok(QueuedJob {
            job_id: self.job_id,
            tasks,
            status: self.status,
            attempts: self.attempts,
            available_at: self.available_at,
            created_at: self.created_at,
        })
    }
}

/// Enqueues a job keyed by `job_id`. The primary key makes this the queue-level dedup: inserting
/// a job that already exists (queued, running, done or dead) changes nothing and returns false.
pub async fn enqueue_job(
    job_id: &str,
    tasks: &[WorkerTask],
    conn: &mut SqliteConnection,
) -> Result<bool, FulfillmentError> {
    let payload = serde_json::to_string(tasks).map_err(|e| FulfillmentError::SerializationError(e.to_string()))?;
    let result = sqlx::query("INSERT OR IGNORE INTO task_jobs (job_id, tasks) VALUES ($1, $2)")
        .bind(job_id)
        .bind(payload)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Claims the oldest due queued job in one guarded update, so two workers can never run the same
/// job at the same time.
pub async fn claim_due_job(conn: &mut SqliteConnection) -> Result<Option<QueuedJob>, FulfillmentError> {
    let row: Option<JobRow> = sqlx::query_as(
        r#"
            UPDATE task_jobs SET
                status = 'Running',
                attempts = attempts + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE job_id = (
                SELECT job_id FROM task_jobs
                WHERE status = 'Queued' AND available_at <= CURRENT_TIMESTAMP
                ORDER BY created_at
                LIMIT 1
            )
            RETURNING *;
        "#,
    )
    .fetch_optional(conn)
    .await?;
    row.map(JobRow::into_job).transpose()
}

pub async fn complete_job(job_id: &str, conn: &mut SqliteConnection) -> Result<(), FulfillmentError> {
    let result =
        sqlx::query("UPDATE task_jobs SET status = 'Done', updated_at = CURRENT_TIMESTAMP WHERE job_id = $1")
            .bind(job_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(FulfillmentError::JobNotFound(job_id.to_string()));
    }
    Ok(())
}

/// Returns a claimed job to the queue with exponential backoff, or buries it once the attempt
/// budget is spent. The backoff doubles per attempt already made.
pub async fn retry_or_bury_job(
    job_id: &str,
    max_attempts: i64,
    base_backoff: Duration,
    conn: &mut SqliteConnection,
) -> Result<JobStatus, FulfillmentError> {
    let row: Option<JobRow> = sqlx::query_as("SELECT * FROM task_jobs WHERE job_id = $1")
        .bind(job_id)
        .fetch_optional(&mut *conn)
        .await?;
    let job = row.ok_or_else(|| FulfillmentError::JobNotFound(job_id.to_string()))?;
    if job.attempts >= max_attempts {
        sqlx::query("UPDATE task_jobs SET status = 'Dead', updated_at = CURRENT_TIMESTAMP WHERE job_id = $1")
            .bind(job_id)
            .execute(conn)
            .await?;
        return Ok(JobStatus::Dead);
    }
    let backoff_secs = base_backoff.num_seconds() << (job.attempts - 1).max(0);
    let modifier = format!("+{backoff_secs} seconds");
    trace!("🗃️ Requeuing job [{job_id}] with backoff {modifier}");
    sqlx::query(
        r#"
            UPDATE task_jobs SET
                status = 'Queued',
                available_at = datetime(CURRENT_TIMESTAMP, $2),
                updated_at = CURRENT_TIMESTAMP
            WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .bind(modifier)
    .execute(conn)
    .await?;
    Ok(JobStatus::Queued)
}

/// Requeues running jobs whose worker evidently died mid-run.
pub async fn requeue_stale_jobs(stale_after: Duration, conn: &mut SqliteConnection) -> Result<u64, FulfillmentError> {
    let result = sqlx::query(
        format!(
            "UPDATE task_jobs SET status = 'Queued', updated_at = CURRENT_TIMESTAMP WHERE status = 'Running' AND \
             (unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at)) > {}",
            stale_after.num_seconds()
        )
        .as_str(),
    )
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_job(job_id: &str, conn: &mut SqliteConnection) -> Result<Option<QueuedJob>, FulfillmentError> {
    let row: Option<JobRow> =
        sqlx::query_as("SELECT * FROM task_jobs WHERE job_id = $1").bind(job_id).fetch_optional(conn).await?;
    row.map(JobRow::into_job).transpose()
}
