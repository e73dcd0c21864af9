//! Bridge between the stock catalogue, the queue, and typed task records

use std::sync::Arc;
use std::time::Duration;

use super::{Task, TaskType};
use crate::config::StockList;
use crate::error::Result;
use crate::models::Article;
use crate::queue::TaskQueue;

/// Task queue service
///
/// Owns the serialization envelope: everything above this layer deals in
/// [`Task`] values, everything below in opaque bytes.
pub struct TaskService {
    queue: Arc<dyn TaskQueue>,
    stocks: StockList,
}

impl TaskService {
    /// Create a service over a queue capability and the stock catalogue
    pub fn new(queue: Arc<dyn TaskQueue>, stocks: StockList) -> Self {
        Self { queue, stocks }
    }

    /// Seed the queue for a task type with every enabled stock
    ///
    /// Guard: when the queue already holds items the seed is skipped and
    /// 0 is returned, making seeding idempotent across process restarts
    /// and across pools sharing one queue. Per-item enqueue failures are
    /// logged and skipped.
    pub async fn seed_all(&self, task_type: TaskType, source: &str) -> Result<usize> {
        let queue_name = task_type.queue_name();

        let length = self.queue.len(&queue_name).await?;
        if length > 0 {
            tracing::info!(
                queue = %queue_name,
                length,
                "queue already seeded, skipping"
            );
            return Ok(0);
        }

        let mut added = 0;
        for stock in self.stocks.enabled() {
            let task = Task::scrape(&stock.symbol, source);

            let payload = match task.encode() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(symbol = %stock.symbol, error = %e, "failed to encode seed task");
                    continue;
                }
            };

            if let Err(e) = self.queue.enqueue(&queue_name, payload).await {
                tracing::warn!(symbol = %stock.symbol, error = %e, "failed to enqueue seed task");
                continue;
            }

            added += 1;
        }

        tracing::info!(queue = %queue_name, added, source, "seeded task queue");
        Ok(added)
    }

    /// Blocking-dequeue the next task of a type, waiting up to `timeout`
    ///
    /// `Ok(None)` means the queue stayed empty for the whole timeout - a
    /// normal idle outcome. A payload that does not decode is an error.
    pub async fn next(&self, task_type: TaskType, timeout: Duration) -> Result<Option<Task>> {
        let queue_name = task_type.queue_name();

        let Some(payload) = self.queue.dequeue(&queue_name, timeout).await? else {
            return Ok(None);
        };

        let task = Task::decode(&payload)?;
        Ok(Some(task))
    }

    /// Serialize a task onto the queue for its type
    pub async fn enqueue(&self, task: &Task) -> Result<()> {
        let payload = task.encode()?;
        self.queue.enqueue(&task.queue_name(), payload).await?;
        Ok(())
    }

    /// Push a raw payload onto the dead-letter queue for a task type
    pub async fn dead_letter(&self, task_type: TaskType, payload: Vec<u8>) -> Result<()> {
        self.queue
            .enqueue(&task_type.dead_letter_queue(), payload)
            .await?;
        Ok(())
    }

    /// Number of tasks waiting on the queue for a type
    pub async fn pending(&self, task_type: TaskType) -> Result<usize> {
        Ok(self.queue.len(&task_type.queue_name()).await?)
    }

    /// Construct a consume task for an article produced by a scrape
    pub fn consume_task(symbol: &str, source: &str, article: &Article) -> Result<Task> {
        Ok(Task::consume(symbol, source, article)?)
    }

    /// Construct a scrape task for one symbol from one source
    pub fn scrape_task(symbol: &str, source: &str) -> Task {
        Task::scrape(symbol, source)
    }
}
