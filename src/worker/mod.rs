//! Worker runtime: the `Worker` contract, lifecycle state, and pools
//!
//! A worker is a long-running loop that pulls typed tasks from its input
//! queue and hands each one to an external capability. Two concrete kinds
//! exist: the scraper worker (scrape-and-publish) and the consumer worker
//! (consume-and-persist). Workers are grouped into fixed-size [`Pool`]s
//! and built by the [`WorkerFactory`], which is the only place external
//! capabilities are bound into worker instances.
//!
//! # Lifecycle
//!
//! The active flag is a lock-free atomic: `start` flips it 0 -> 1 with a
//! compare-and-swap and rejects a second activation; `stop` flips it back.
//! A worker parked inside a blocking dequeue notices deactivation only
//! after the dequeue returns, so shutdown pairs the flag flip with
//! cancelling the worker's scope.

pub mod error;
pub mod factory;
pub mod pool;
pub mod stats;

mod consumer_worker;
mod scraper_worker;

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use consumer_worker::ConsumerWorker;
pub use error::WorkerError;
pub use factory::WorkerFactory;
pub use pool::Pool;
pub use scraper_worker::ScraperWorker;
pub use stats::{Stats, StatsSnapshot};

/// How long a worker waits on an empty queue before looping
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a queue error before the next attempt
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// The two concrete worker kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Scraper,
    Consumer,
}

impl WorkerKind {
    /// Canonical string form, used by the factory and in worker names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraper => "Scraper",
            Self::Consumer => "Consumer",
        }
    }

    /// Parse a kind string; anything unknown is an error
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "Scraper" => Ok(Self::Scraper),
            "Consumer" => Ok(Self::Consumer),
            other => Err(WorkerError::UnknownKind(other.to_string()).into()),
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic worker that can process tasks
#[async_trait]
pub trait Worker: Send + Sync + std::fmt::Debug {
    /// Run the processing loop until the scope is cancelled or the worker
    /// is deactivated. Rejects a second concurrent activation.
    async fn start(&self, scope: CancellationToken) -> Result<()>;

    /// Request deactivation; the loop exits after its current iteration
    fn stop(&self) -> Result<()>;

    /// The worker's name
    fn name(&self) -> &str;

    /// The worker's kind
    fn kind(&self) -> WorkerKind;

    /// A copy of the worker's current stats
    fn stats(&self) -> StatsSnapshot;
}

/// Common attributes shared by all worker kinds
#[derive(Debug)]
pub struct BaseWorker {
    pub id: usize,
    name: String,
    kind: WorkerKind,
    active: AtomicBool,
    pub stats: Stats,
}

impl BaseWorker {
    /// Create a base worker; the name is derived from kind and id
    pub fn new(id: usize, kind: WorkerKind) -> Self {
        Self {
            id,
            name: format!("{}-{}", kind.as_str().to_lowercase(), id),
            kind,
            active: AtomicBool::new(false),
            stats: Stats::new(),
        }
    }

    /// Set the active state
    ///
    /// Returns true if the state changed, false if it was already in the
    /// requested state. The 0 -> 1 transition is the "may I enter the
    /// loop" predicate for `start`.
    pub fn set_active(&self, active: bool) -> bool {
        self.active
            .compare_exchange(!active, active, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the worker is currently active
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The worker's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The worker's kind
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }
}
