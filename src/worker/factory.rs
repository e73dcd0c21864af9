//! Worker factory
//!
//! The sole place external capabilities (scraper, task service,
//! repository) are bound into worker instances, keeping them out of the
//! scheduler and pool layers.

use std::sync::Arc;
use std::time::Duration;

use super::{
    BaseWorker, ConsumerWorker, ScraperWorker, Worker, WorkerKind, DEFAULT_POLL_TIMEOUT,
};
use crate::error::Result;
use crate::scraper::Scraper;
use crate::storage::ArticleRepository;
use crate::task::TaskService;

/// Builds workers from a kind string
pub struct WorkerFactory {
    scraper: Arc<dyn Scraper>,
    tasks: Arc<TaskService>,
    repository: Arc<dyn ArticleRepository>,
    poll_timeout: Duration,
}

impl WorkerFactory {
    /// Create a factory over the three external capabilities
    pub fn new(
        scraper: Arc<dyn Scraper>,
        tasks: Arc<TaskService>,
        repository: Arc<dyn ArticleRepository>,
    ) -> Self {
        Self {
            scraper,
            tasks,
            repository,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the queue poll timeout for all built workers
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Create a worker of the given kind
    pub fn create(&self, id: usize, kind: &str, source: &str) -> Result<Arc<dyn Worker>> {
        let kind = WorkerKind::parse(kind)?;
        let base = BaseWorker::new(id, kind);

        let worker: Arc<dyn Worker> = match kind {
            WorkerKind::Scraper => Arc::new(ScraperWorker::new(
                base,
                Arc::clone(&self.scraper),
                Arc::clone(&self.tasks),
                source,
                self.poll_timeout,
            )),
            WorkerKind::Consumer => Arc::new(ConsumerWorker::new(
                base,
                Arc::clone(&self.tasks),
                Arc::clone(&self.repository),
                self.poll_timeout,
            )),
        };

        Ok(worker)
    }
}
