//! Scraper worker: pulls scrape tasks, invokes the scrape capability
//!
//! One task yields N articles; the stat counts tasks, not articles, so
//! processed counts stay comparable across worker kinds. The article
//! count is logged.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{BaseWorker, StatsSnapshot, Worker, WorkerError, WorkerKind, ERROR_BACKOFF};
use crate::error::Result;
use crate::scraper::Scraper;
use crate::task::{TaskService, TaskType};

/// Worker that scrapes sources and publishes articles to the consume queue
pub struct ScraperWorker {
    base: BaseWorker,
    scraper: Arc<dyn Scraper>,
    tasks: Arc<TaskService>,
    source: String,
    poll_timeout: Duration,
}

impl std::fmt::Debug for ScraperWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperWorker")
            .field("base", &self.base)
            .field("source", &self.source)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl ScraperWorker {
    /// Create a scraper worker bound to its capabilities
    pub fn new(
        base: BaseWorker,
        scraper: Arc<dyn Scraper>,
        tasks: Arc<TaskService>,
        source: impl Into<String>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            base,
            scraper,
            tasks,
            source: source.into(),
            poll_timeout,
        }
    }
}

#[async_trait]
impl Worker for ScraperWorker {
    async fn start(&self, scope: CancellationToken) -> Result<()> {
        if !self.base.set_active(true) {
            return Err(WorkerError::AlreadyRunning(self.base.name().to_string()).into());
        }

        tracing::info!(worker = self.base.name(), source = %self.source, "scraper worker started");

        while self.base.is_active() && !scope.is_cancelled() {
            self.base.stats.record_start();

            let next = tokio::select! {
                _ = scope.cancelled() => break,
                next = self.tasks.next(TaskType::Scrape, self.poll_timeout) => next,
            };

            let task = match next {
                Ok(Some(task)) => task,
                // Empty after timeout: an idle beat, not a failure
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

            let (symbol, source) = match (task.symbol(), task.source()) {
                (Ok(symbol), Ok(source)) => (symbol.to_string(), source.to_string()),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(worker = self.base.name(), error = %e, "dropping incomplete scrape task");
                    self.base.stats.record_failure();
                    continue;
                }
            };

            tracing::debug!(worker = self.base.name(), symbol, source, "processing scrape task");

            match self.scraper.scrape_and_publish(&scope, &source, &symbol).await {
                Ok(articles) => {
                    self.base.stats.record_success();
                    let stats = self.base.stats.snapshot();
                    tracing::info!(
                        worker = self.base.name(),
                        symbol,
                        articles = articles.len(),
                        processed = stats.items_processed,
                        successful = stats.items_successful,
                        failed = stats.items_failed,
                        "scrape task completed"
                    );
                }
                Err(e) if scope.is_cancelled() => {
                    tracing::debug!(worker = self.base.name(), error = %e, "scrape interrupted by shutdown");
                    break;
                }
                Err(e) => {
                    tracing::warn!(worker = self.base.name(), symbol, error = %e, "scrape task failed");
                    self.base.stats.record_failure();
                }
            }
        }

        self.base.stats.record_stop();
        self.base.set_active(false);
        tracing::info!(worker = self.base.name(), "scraper worker stopped");
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
        WorkerKind::Scraper
    }

    fn stats(&self) -> StatsSnapshot {
        self.base.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Stock, StockList};
    use crate::models::Article;
    use crate::queue::MemoryQueue;

    struct StubScraper;

    #[async_trait]
    impl Scraper for StubScraper {
        async fn scrape_and_publish(
            &self,
            _scope: &CancellationToken,
            source: &str,
            symbol: &str,
        ) -> Result<Vec<Article>> {
            Ok(vec![Article::new(
                format!("t-{symbol}"),
                format!("https://x/{symbol}"),
                "",
                source,
                symbol,
            )])
        }
    }

    fn task_service(symbols: &[&str]) -> Arc<TaskService> {
        Arc::new(TaskService::new(
            Arc::new(MemoryQueue::new()),
            StockList {
                stocks: symbols
                    .iter()
                    .map(|s| Stock {
                        symbol: s.to_string(),
                        name: None,
                        enabled: true,
                    })
                    .collect(),
            },
        ))
    }

    fn worker(tasks: Arc<TaskService>) -> ScraperWorker {
        ScraperWorker::new(
            BaseWorker::new(0, WorkerKind::Scraper),
            Arc::new(StubScraper),
            tasks,
            "yahoo",
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let tasks = task_service(&[]);
        let w = Arc::new(worker(tasks));
        let scope = CancellationToken::new();

        let running = {
            let w = Arc::clone(&w);
            let scope = scope.clone();
            tokio::spawn(async move { w.start(scope).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = w.start(scope.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Worker(WorkerError::AlreadyRunning(_))
        ));

        scope.cancel();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_drains_seeded_queue() {
        let tasks = task_service(&["AAPL", "MSFT"]);
        tasks.seed_all(TaskType::Scrape, "yahoo").await.unwrap();

        let w = Arc::new(worker(Arc::clone(&tasks)));
        let scope = CancellationToken::new();

        let handle = {
            let w = Arc::clone(&w);
            let scope = scope.clone();
            tokio::spawn(async move { w.start(scope).await })
        };

        // Both scrape tasks processed, two consume tasks published
        tokio::time::sleep(Duration::from_millis(200)).await;
        scope.cancel();
        handle.await.unwrap().unwrap();

        let stats = w.stats();
        assert_eq!(stats.items_successful, 2);
        assert_eq!(stats.items_failed, 0);
        assert_eq!(
            stats.items_processed,
            stats.items_successful + stats.items_failed
        );
        assert_eq!(tasks.pending(TaskType::Scrape).await.unwrap(), 0);
        assert_eq!(tasks.pending(TaskType::Consume).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_incomplete_task_counts_as_failure() {
        let tasks = task_service(&[]);
        let mut bad = crate::task::Task::new(TaskType::Scrape);
        bad.params.symbol = Some("AAPL".to_string());
        // source missing
        tasks.enqueue(&bad).await.unwrap();

        let w = Arc::new(worker(Arc::clone(&tasks)));
        let scope = CancellationToken::new();
        let handle = {
            let w = Arc::clone(&w);
            let scope = scope.clone();
            tokio::spawn(async move { w.start(scope).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        scope.cancel();
        handle.await.unwrap().unwrap();

        let stats = w.stats();
        assert_eq!(stats.items_failed, 1);
        assert_eq!(stats.items_successful, 0);
    }

    #[tokio::test]
    async fn test_stop_flag_exits_loop() {
        let tasks = task_service(&[]);
        let w = Arc::new(worker(tasks));
        let scope = CancellationToken::new();

        let handle = {
            let w = Arc::clone(&w);
            let scope = scope.clone();
            tokio::spawn(async move { w.start(scope).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        w.stop().unwrap();

        // The worker notices deactivation after its current poll returns
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not exit after stop")
            .unwrap()
            .unwrap();
        assert!(!w.stats().is_running);
    }
}
