//! Unified error handling for the propagator crate
//!
//! Domain-specific errors live next to the code that raises them
//! ([`SchedulerError`], [`WorkerError`], [`TaskError`], [`QueueError`]);
//! this module consolidates them into a single [`Error`] enum so that
//! callers crossing module boundaries can hold one error type without
//! losing the detailed variant underneath.

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::models::ArticleError;
pub use crate::queue::QueueError;
pub use crate::scheduler::error::SchedulerError;
pub use crate::scraper::ScrapeError;
pub use crate::task::TaskError;
pub use crate::worker::error::WorkerError;

/// Unified error type for the propagator crate
#[derive(Error, Debug)]
pub enum Error {
    /// Job registry and execution errors
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Worker and pool lifecycle errors
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Task construction and decoding errors
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Broker transport errors
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Scrape capability errors
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Article validation errors
    #[error("invalid article: {0}")]
    Article(#[from] ArticleError),

    /// Repository write-path errors
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),

    /// The surrounding cancellation scope was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if this error is transient (worth retrying or backing off on)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Queue(_) | Self::Io(_) | Self::Storage(_) => true,
            Self::Scrape(e) => e.is_recoverable(),
            _ => false,
        }
    }

    /// Check if this error represents cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
