//! The asynchronous side-effect machinery: task definitions, the per-job runner, and the
//! polling worker that drains the durable queue.
mod task_types;
mod worker;

pub use task_types::{tasks_for_order, WorkerTask};
#[cfg(feature = "sqlite")]
pub use worker::start_task_worker;
pub use worker::{TaskRunner, DEFAULT_POLL_INTERVAL, JOB_BASE_BACKOFF, MAX_JOB_ATTEMPTS, STALE_JOB_TIMEOUT};
