//! Consumer worker: drains the consume queue into the repository
//!
//! Each consume task carries one article envelope. Tasks whose article
//! fails to persist are pushed to the dead-letter queue rather than
//! silently dropped; decoding failures are logged and counted.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{BaseWorker, StatsSnapshot, Worker, WorkerError, WorkerKind, ERROR_BACKOFF};
use crate::error::Result;
use crate::storage::ArticleRepository;
use crate::task::{Task, TaskService, TaskType};

/// Worker that persists published articles
pub struct ConsumerWorker {
    base: BaseWorker,
    tasks: Arc<TaskService>,
    repository: Arc<dyn ArticleRepository>,
    poll_timeout: Duration,
}

impl std::fmt::Debug for ConsumerWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerWorker")
            .field("base", &self.base)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl ConsumerWorker {
    /// Create a consumer worker bound to its capabilities
    pub fn new(
        base: BaseWorker,
        tasks: Arc<TaskService>,
        repository: Arc<dyn ArticleRepository>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            base,
            tasks,
            repository,
            poll_timeout,
        }
    }

    async fn process(&self, scope: &CancellationToken, task: &Task) -> bool {
        let article = match task.article() {
            Ok(article) => article,
            Err(e) => {
                tracing::warn!(worker = self.base.name(), error = %e, "dropping malformed consume task");
                return false;
            }
        };

        if let Err(e) = article.validate() {
            tracing::warn!(worker = self.base.name(), url = %article.url, error = %e, "dropping invalid article");
            return false;
        }

        match self.repository.save(scope, &article).await {
            Ok(()) => {
                tracing::debug!(worker = self.base.name(), url = %article.url, "article persisted");
                true
            }
            Err(e) => {
                tracing::warn!(worker = self.base.name(), url = %article.url, error = %e, "failed to persist article");
                self.dead_letter(task).await;
                false
            }
        }
    }

    /// Best-effort push of a failed task to the dead-letter queue
    async fn dead_letter(&self, task: &Task) {
        let payload = match task.encode() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(worker = self.base.name(), error = %e, "failed to encode dead-letter payload");
                return;
            }
        };

        if let Err(e) = self.tasks.dead_letter(TaskType::Consume, payload).await {
            tracing::error!(worker = self.base.name(), error = %e, "failed to dead-letter consume task");
        }
    }
}

#[async_trait]
impl Worker for ConsumerWorker {
    async fn start(&self, scope: CancellationToken) -> Result<()> {
        if !self.base.set_active(true) {
            return Err(WorkerError::AlreadyRunning(self.base.name().to_string()).into());
        }

        tracing::info!(worker = self.base.name(), "consumer worker started");

        while self.base.is_active() && !scope.is_cancelled() {
            self.base.stats.record_start();

            let next = tokio::select! {
                _ = scope.cancelled() => break,
                next = self.tasks.next(TaskType::Consume, self.poll_timeout) => next,
            };

            let task = match next {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(worker = self.base.name(), error = %e, "failed to get next task");
                    self.base.stats.record_failure();
                    tokio::select! {
                        _ = scope.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                    continue;
                }
            };

            if self.process(&scope, &task).await {
                self.base.stats.record_success();
            } else {
                self.base.stats.record_failure();
            }
        }

        self.base.stats.record_stop();
        self.base.set_active(false);
        tracing::info!(worker = self.base.name(), "consumer worker stopped");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.base.set_active(false);
        Ok(())
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Consumer
    }

    fn stats(&self) -> StatsSnapshot {
        self.base.stats.snapshot()
    }
}
