//! propagator - cron-driven stock news ingestion engine
//!
//! On a schedule, the engine fans out per-symbol work items to pools of
//! workers that scrape remote sources, publish normalized articles onto a
//! durable queue, and drain that queue into a relational store.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration document and loading
//! - [`models`] - Core data structures ([`models::Article`])
//! - [`task`] - Typed task records and the task service
//! - [`queue`] - Queue capability and broker adapters (Redis, in-memory)
//! - [`scheduler`] - Cron-expression-driven job scheduler
//! - [`worker`] - Worker contract, stats, pools, and the factory
//! - [`scraper`] - Scrape capability and the publishing scrape service
//! - [`storage`] - Article repository abstraction
//! - [`orchestrator`] - Binds worker pools to scheduler jobs
//!
//! # Example
//!
//! ```no_run
//! use propagator::config::Config;
//! use propagator::orchestrator::{Orchestrator, PoolConfig};
//! use propagator::queue::RedisQueue;
//! use propagator::scheduler::Scheduler;
//! use propagator::scraper::ScrapeService;
//! use propagator::storage::MemoryArticleRepository;
//! use propagator::task::{TaskService, TaskType};
//! use propagator::worker::WorkerFactory;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.json")?;
//!
//!     let queue = Arc::new(RedisQueue::new(&config.redis)?);
//!     let tasks = Arc::new(TaskService::new(queue, config.stock_list.clone()));
//!     let scraper = Arc::new(ScrapeService::new(Arc::clone(&tasks)));
//!     let repository = Arc::new(MemoryArticleRepository::new());
//!     let factory = Arc::new(WorkerFactory::new(scraper, Arc::clone(&tasks), repository));
//!
//!     let scheduler = Arc::new(Scheduler::from_config(&config.scheduler)?);
//!     let orchestrator = Orchestrator::new(scheduler, factory, tasks);
//!
//!     orchestrator
//!         .register_pool(PoolConfig {
//!             pool_size: 4,
//!             worker_kind: "Scraper".into(),
//!             job_name: "news-scraper".into(),
//!             cron_expr: "0 */5 * * * *".into(),
//!             source: "yahoo".into(),
//!             task_type: Some(TaskType::Scrape),
//!             enabled: true,
//!         })
//!         .await?;
//!
//!     orchestrator.start();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod scheduler;
pub mod scraper;
pub mod storage;
pub mod task;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::Article;
    pub use crate::orchestrator::{Orchestrator, PoolConfig};
    pub use crate::queue::{MemoryQueue, RedisQueue, TaskQueue};
    pub use crate::scheduler::{JobStatus, Scheduler};
    pub use crate::scraper::{ScrapeService, Scraper, SiteScraper};
    pub use crate::storage::ArticleRepository;
    pub use crate::task::{Task, TaskService, TaskType};
    pub use crate::worker::{Pool, Worker, WorkerFactory, WorkerKind};
}

// Direct re-exports for convenience
pub use error::{Error, Result};
pub use models::Article;
