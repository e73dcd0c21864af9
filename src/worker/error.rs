//! Error types for the worker runtime

use thiserror::Error;

/// Worker and pool lifecycle errors
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Start was called on a worker whose active flag is already set
    #[error("worker '{0}' is already running")]
    AlreadyRunning(String),

    /// AddWorker was called after the pool started
    #[error("cannot add worker while pool is running")]
    PoolRunning,

    /// Start was called on a pool that is already running
    #[error("worker pool is already running")]
    PoolAlreadyRunning,

    /// AddWorker would exceed the declared capacity
    #[error("worker pool is full (capacity {0})")]
    PoolFull(usize),

    /// The factory was asked for a kind it does not know
    #[error("unknown worker kind: {0}")]
    UnknownKind(String),
}

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;
