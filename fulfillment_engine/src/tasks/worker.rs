use std::sync::Arc;

use chrono::Duration;
use log::*;

use crate::{
    db_types::OrderId,
    tasks::WorkerTask,
    traits::{
        FulfillmentDatabase,
        FulfillmentError,
        Notification,
        NotificationRecipient,
        NotificationSink,
        QueuedJob,
        ReceiptMailer,
        TaskQueue,
    },
};

/// A job gets this many attempts before it is moved to the dead-letter state.
pub const MAX_JOB_ATTEMPTS: i64 = 5;
/// First retry delay; doubles per attempt.
pub const JOB_BASE_BACKOFF: Duration = Duration::seconds(30);
/// A `Running` job untouched for this long is assumed orphaned and requeued.
pub const STALE_JOB_TIMEOUT: Duration = Duration::minutes(10);
pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// Executes the tasks of claimed jobs against the external collaborators.
///
/// Tasks within a job run sequentially, and a task failure is logged and isolated: a broken
/// mailer must not block the shop notifications behind it. The job only completes once every
/// task has been attempted; if any failed, the whole job goes back to the queue with backoff
/// (tasks are idempotent, so the replay of already-delivered tasks is harmless).
pub struct TaskRunner<B> {
    db: B,
    notifier: Arc<dyn NotificationSink>,
    mailer: Arc<dyn ReceiptMailer>,
}

impl<B> TaskRunner<B>
where B: FulfillmentDatabase + TaskQueue
{
    pub fn new(db: B, notifier: Arc<dyn NotificationSink>, mailer: Arc<dyn ReceiptMailer>) -> Self {
        Self { db, notifier, mailer }
    }

    /// Claims and runs due jobs until the queue is drained. Returns how many jobs were run.
    pub async fn run_due_jobs(&self) -> Result<usize, FulfillmentError> {
        let mut processed = 0;
        while let Some(job) = self.db.claim_due_job().await? {
            self.run_job(job).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Runs a claimed job to completion: every task attempted, failures tallied, and the job
    /// completed or requeued accordingly.
    pub async fn run_job(&self, job: QueuedJob) -> Result<(), FulfillmentError> {
        let job_id = job.job_id.clone();
        debug!("⚙️️ Running job [{job_id}] with {} task(s) (attempt {})", job.tasks.len(), job.attempts);
        let mut failures = 0usize;
        for task in &job.tasks {
            if let Err(e) = self.run_task(task).await {
                failures += 1;
                warn!("⚙️️ Task {} in job [{job_id}] failed: {e}. Continuing with the remaining tasks.", task_label(task));
            }
        }
        if failures == 0 {
            self.db.complete_job(&job_id).await?;
            info!("⚙️️ Job [{job_id}] complete");
        } else {
            let status = self.db.retry_or_bury_job(&job_id, MAX_JOB_ATTEMPTS, JOB_BASE_BACKOFF).await?;
            warn!("⚙️️ Job [{job_id}] had {failures} failed task(s). New status: {status}");
        }
        Ok(())
    }

    async fn run_task(&self, task: &WorkerTask) -> Result<(), String> {
        match task {
            WorkerTask::NotifyShop { shop_id, order_id, item_count } => {
                self.push(
                    NotificationRecipient::ShopOwner(shop_id.clone()),
                    "New order".to_string(),
                    format!("{item_count} item(s) of yours were ordered in {order_id}"),
                )
                .await
            },
            WorkerTask::NotifyBuyer { buyer_id, order_id } => {
                self.push(
                    NotificationRecipient::Buyer(buyer_id.clone()),
                    "Order confirmed".to_string(),
                    format!("Your order {order_id} has been placed"),
                )
                .await
            },
            WorkerTask::EmailReceipt { receipt } => {
                self.mailer.send_receipt(receipt.clone()).await.map_err(|e| e.to_string())
            },
            WorkerTask::NotifyAdmins { order_id, buyer_id } => {
                self.push(
                    NotificationRecipient::Admins,
                    "New order".to_string(),
                    format!("{order_id} placed by buyer {buyer_id}"),
                )
                .await
            },
            WorkerTask::CreditLoyaltyPoints { order_id } => self.credit_points(order_id).await,
            WorkerTask::MarkBuyerOrdered { buyer_id } => {
                self.db.mark_buyer_ordered(buyer_id).await.map_err(|e| e.to_string())
            },
            WorkerTask::NotifyShopRevenue { shop_id, order_id, amount } => {
                self.push(
                    NotificationRecipient::ShopOwner(shop_id.clone()),
                    "Revenue recorded".to_string(),
                    format!("{amount} is pending payout for {order_id}"),
                )
                .await
            },
        }
    }

    async fn push(&self, recipient: NotificationRecipient, subject: String, body: String) -> Result<(), String> {
        self.notifier.push(Notification { recipient, subject, body }).await.map_err(|e| e.to_string())
    }

    async fn credit_points(&self, order_id: &OrderId) -> Result<(), String> {
        let credited = self.db.credit_loyalty_points(order_id).await.map_err(|e| e.to_string())?;
        if credited {
            debug!("⚙️️ Loyalty points credited for {order_id}");
        } else {
            trace!("⚙️️ Loyalty points for {order_id} were already credited. Replay ignored.");
        }
        Ok(())
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn task_label(task: &WorkerTask) -> &'static str {
    match task {
        WorkerTask::NotifyShop { .. } => "NotifyShop",
        WorkerTask::NotifyBuyer { .. } => "NotifyBuyer",
        WorkerTask::EmailReceipt { .. } => "EmailReceipt",
        WorkerTask::NotifyAdmins { .. } => "NotifyAdmins",
        WorkerTask::CreditLoyaltyPoints { .. } => "CreditLoyaltyPoints",
        WorkerTask::MarkBuyerOrdered { .. } => "MarkBuyerOrdered",
        WorkerTask::NotifyShopRevenue { .. } => "NotifyShopRevenue",
    }
}

/// Starts the queue worker. Do not await the returned JoinHandle, as it runs indefinitely.
#[cfg(feature = "sqlite")]
pub fn start_task_worker(
    db: crate::SqliteDatabase,
    notifier: Arc<dyn NotificationSink>,
    mailer: Arc<dyn ReceiptMailer>,
    poll_interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let runner = TaskRunner::new(db, notifier, mailer);
        let mut timer = tokio::time::interval(poll_interval);
        info!("⚙️️ Task queue worker started");
        loop {
            timer.tick().await;
            match runner.db().requeue_stale_jobs(STALE_JOB_TIMEOUT).await {
                Ok(0) => {},
                Ok(n) => warn!("⚙️️ Requeued {n} stale job(s) from a previous worker"),
                Err(e) => error!("⚙️️ Error requeuing stale jobs: {e}"),
            }
            match runner.run_due_jobs().await {
                Ok(0) => trace!("⚙️️ No jobs due"),
                Ok(n) => debug!("⚙️️ Processed {n} job(s)"),
                Err(e) => error!("⚙️️ Error draining the task queue: {e}"),
            }
        }
    })
}
