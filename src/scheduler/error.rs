//! Error types for the scheduler module

use thiserror::Error;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression did not parse
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    /// A job with this name is already registered
    #[error("job '{0}' already exists")]
    DuplicateJob(String),

    /// No job with this name is registered
    #[error("job '{0}' not found")]
    UnknownJob(String),

    /// A manual trigger hit a job that is currently executing
    #[error("job '{0}' is already running")]
    AlreadyRunning(String),

    /// A placeholder job fired before a handler was bound
    #[error("job '{0}' has no registered handler")]
    HandlerNotRegistered(String),
}

impl SchedulerError {
    /// Create an invalid-cron error
    pub fn invalid_cron(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCron {
            expr: expr.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_cron_display() {
        let err = SchedulerError::invalid_cron("* * *", "expected six fields");
        assert!(err.to_string().contains("* * *"));
        assert!(err.to_string().contains("six fields"));
    }

    #[test]
    fn test_unknown_job_display() {
        let err = SchedulerError::UnknownJob("news-scraper".into());
        assert!(err.to_string().contains("news-scraper"));
    }
}
