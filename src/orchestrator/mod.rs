//! Orchestrator: binds worker pools to scheduler jobs
//!
//! Registration builds a pool, seeds its input queue, fills it with
//! factory-built workers, and installs a job handler that runs the pool
//! for one scheduling window. The handler starts the pool on a child
//! scope, waits for either cancellation or a grace deadline shorter than
//! the job timeout (leaving shutdown budget), then stops and joins the
//! pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::task::{TaskService, TaskType};
use crate::worker::{Pool, StatsSnapshot, WorkerFactory};

/// Per-run wall-clock budget for pool jobs
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How long a pool runs before the handler begins shutdown; shorter than
/// the job timeout so stop + wait happen inside the budget
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(4 * 60);

/// Configuration for one worker pool registration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers in the pool
    pub pool_size: usize,

    /// Worker kind string understood by the factory
    pub worker_kind: String,

    /// Scheduler job the pool is bound to
    pub job_name: String,

    /// Cron expression for the job (six fields, seconds precision)
    pub cron_expr: String,

    /// Source label passed to created workers and used for seeding
    pub source: String,

    /// Queue to seed at registration; only scrape queues are seeded
    pub task_type: Option<TaskType>,

    /// Disabled registrations are skipped
    pub enabled: bool,
}

/// Binds pools of workers to cron-scheduled jobs
pub struct Orchestrator {
    scheduler: Arc<Scheduler>,
    factory: Arc<WorkerFactory>,
    tasks: Arc<TaskService>,
    pools: Mutex<HashMap<String, Arc<Pool>>>,
    job_timeout: Duration,
    grace_period: Duration,
}

impl Orchestrator {
    /// Create an orchestrator over a scheduler, a worker factory, and the
    /// task service used for seeding
    pub fn new(
        scheduler: Arc<Scheduler>,
        factory: Arc<WorkerFactory>,
        tasks: Arc<TaskService>,
    ) -> Self {
        Self {
            scheduler,
            factory,
            tasks,
            pools: Mutex::new(HashMap::new()),
            job_timeout: DEFAULT_JOB_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Override the per-run job timeout
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Override the pool run window
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Create and register a worker pool bound to a scheduler job
    ///
    /// Seeding and worker construction failures abort the registration;
    /// nothing is installed in that case.
    pub async fn register_pool(&self, config: PoolConfig) -> Result<()> {
        if !config.enabled {
            tracing::info!(job = %config.job_name, "pool registration disabled, skipping");
            return Ok(());
        }

        let pool = Arc::new(Pool::new(config.pool_size));

        // Seed the input queue before any worker can poll it. Consumer
        // pools have nothing to seed - their queue is fed by scrapers.
        if config.task_type == Some(TaskType::Scrape) {
            self.tasks
                .seed_all(TaskType::Scrape, &config.source)
                .await?;
        }

        for id in 0..config.pool_size {
            let worker = self
                .factory
                .create(id, &config.worker_kind, &config.source)?;
            pool.add_worker(worker)?;
        }

        self.install_handler(&config, Arc::clone(&pool))?;

        self.pools
            .lock()
            .unwrap()
            .insert(config.job_name.clone(), pool);

        tracing::info!(
            job = %config.job_name,
            kind = %config.worker_kind,
            size = config.pool_size,
            "worker pool registered"
        );
        Ok(())
    }

    fn install_handler(&self, config: &PoolConfig, pool: Arc<Pool>) -> Result<()> {
        let grace = self.grace_period;
        let job_name = config.job_name.clone();

        let handler = move |scope: CancellationToken| {
            let pool = Arc::clone(&pool);
            let job_name = job_name.clone();
            async move { run_pool_window(pool, scope, grace, job_name).await }
        };

        // Bind to a pre-declared placeholder when the job came from
        // config, otherwise install a fresh job.
        if self.scheduler.job_status(&config.job_name).is_ok() {
            self.scheduler.register_handler(&config.job_name, handler)
        } else {
            self.scheduler
                .add_job(&config.job_name, &config.cron_expr, self.job_timeout, handler)
        }
    }

    /// The pool registered under a job name
    pub fn pool(&self, job_name: &str) -> Option<Arc<Pool>> {
        self.pools.lock().unwrap().get(job_name).cloned()
    }

    /// Stats snapshots for every worker of a registered pool
    pub fn pool_stats(&self, job_name: &str) -> Option<Vec<StatsSnapshot>> {
        self.pool(job_name).map(|p| p.stats())
    }

    /// Start the underlying scheduler
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Stop the underlying scheduler, cancelling in-flight pool windows
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Fire a registered job immediately
    pub fn run_job(&self, name: &str) -> Result<()> {
        self.scheduler.run_job(name)
    }
}

/// One scheduling window of a pool: start, run until cancellation or the
/// grace deadline, then stop and join
async fn run_pool_window(
    pool: Arc<Pool>,
    scope: CancellationToken,
    grace: Duration,
    job_name: String,
) -> Result<()> {
    let pool_scope = scope.child_token();
    pool.start(pool_scope.clone())?;
    tracing::info!(job = %job_name, "worker pool started");

    tokio::select! {
        _ = scope.cancelled() => {
            tracing::info!(job = %job_name, "pool window cancelled");
        }
        _ = tokio::time::sleep(grace) => {
            tracing::info!(job = %job_name, "pool window reached maximum runtime");
        }
    }

    pool.stop();
    // Unblock workers parked in a blocking dequeue
    pool_scope.cancel();
    pool.wait().await;

    tracing::info!(job = %job_name, "worker pool completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Stock, StockList};
    use crate::error::Error;
    use crate::models::Article;
    use crate::queue::MemoryQueue;
    use crate::scraper::Scraper;
    use crate::storage::MemoryArticleRepository;
    use crate::worker::WorkerError;
    use async_trait::async_trait;

    struct NoopScraper;

    #[async_trait]
    impl Scraper for NoopScraper {
        async fn scrape_and_publish(
            &self,
            _scope: &CancellationToken,
            _source: &str,
            _symbol: &str,
        ) -> Result<Vec<Article>> {
            Ok(Vec::new())
        }
    }

    fn orchestrator(symbols: &[&str]) -> Orchestrator {
        let tasks = Arc::new(TaskService::new(
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
        ));
        let factory = Arc::new(WorkerFactory::new(
            Arc::new(NoopScraper),
            Arc::clone(&tasks),
            Arc::new(MemoryArticleRepository::new()),
        ));
        Orchestrator::new(
            Arc::new(Scheduler::new(Duration::ZERO)),
            factory,
            tasks,
        )
    }

    fn pool_config(job_name: &str, kind: &str) -> PoolConfig {
        PoolConfig {
            pool_size: 2,
            worker_kind: kind.to_string(),
            job_name: job_name.to_string(),
            cron_expr: "0 0 0 1 1 *".to_string(),
            source: "yahoo".to_string(),
            task_type: Some(TaskType::Scrape),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_register_pool_seeds_and_installs() {
        let orch = orchestrator(&["AAPL", "MSFT"]);

        orch.register_pool(pool_config("scrape-job", "Scraper"))
            .await
            .unwrap();

        let pool = orch.pool("scrape-job").unwrap();
        assert_eq!(pool.worker_count(), 2);
        assert_eq!(orch.tasks.pending(TaskType::Scrape).await.unwrap(), 2);
        assert!(orch.scheduler.job_status("scrape-job").is_ok());
    }

    #[tokio::test]
    async fn test_register_pool_unknown_kind_installs_nothing() {
        let orch = orchestrator(&["AAPL"]);

        let err = orch
            .register_pool(pool_config("bad-job", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Worker(WorkerError::UnknownKind(_))
        ));

        assert!(orch.pool("bad-job").is_none());
        assert!(orch.scheduler.job_status("bad-job").is_err());
    }

    #[tokio::test]
    async fn test_register_disabled_pool_is_skipped() {
        let orch = orchestrator(&["AAPL"]);

        let mut config = pool_config("off-job", "Scraper");
        config.enabled = false;
        orch.register_pool(config).await.unwrap();

        assert!(orch.pool("off-job").is_none());
        assert_eq!(orch.tasks.pending(TaskType::Scrape).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consumer_pool_does_not_seed() {
        let orch = orchestrator(&["AAPL"]);

        let mut config = pool_config("consume-job", "Consumer");
        config.task_type = Some(TaskType::Consume);
        orch.register_pool(config).await.unwrap();

        assert_eq!(orch.tasks.pending(TaskType::Scrape).await.unwrap(), 0);
        assert_eq!(orch.tasks.pending(TaskType::Consume).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_binds_to_predeclared_job() {
        let tasks = Arc::new(TaskService::new(
            Arc::new(MemoryQueue::new()),
            StockList::default(),
        ));
        let factory = Arc::new(WorkerFactory::new(
            Arc::new(NoopScraper),
            Arc::clone(&tasks),
            Arc::new(MemoryArticleRepository::new()),
        ));
        let config = crate::config::SchedulerConfig {
            default_timeout: 0,
            jobs: vec![crate::config::JobConfig {
                name: "declared".into(),
                cron_expr: "0 0 0 1 1 *".into(),
                timeout: 0,
                retry_count: 0,
                enabled: true,
                description: String::new(),
            }],
        };
        let scheduler = Arc::new(Scheduler::from_config(&config).unwrap());
        let orch = Orchestrator::new(Arc::clone(&scheduler), factory, tasks);

        let mut pool_cfg = pool_config("declared", "Consumer");
        pool_cfg.task_type = None;
        orch.register_pool(pool_cfg).await.unwrap();

        // Still one job; the placeholder handler was replaced, not duplicated
        assert_eq!(scheduler.all_jobs().len(), 1);
    }
}
