//! Task queue capability
//!
//! The execution core talks to the broker through the narrow [`TaskQueue`]
//! trait: named FIFO queues of opaque byte payloads with enqueue,
//! blocking-dequeue-with-timeout, length, and clear. Two implementations
//! are provided:
//!
//! - [`redis::RedisQueue`] - the production adapter over a Redis list
//! - [`MemoryQueue`] - an in-process queue for tests and embedded use
//!
//! Queue implementations must be safe for concurrent callers; FIFO order
//! is honoured per consumer but interleaved across consumers.

pub mod redis;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

pub use self::redis::RedisQueue;

/// Broker transport errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// The broker could not be reached
    #[error("broker unavailable: {0}")]
    Connection(String),

    /// A queue operation failed on the broker side
    #[error("queue operation '{op}' on '{queue}' failed: {reason}")]
    Backend {
        op: &'static str,
        queue: String,
        reason: String,
    },
}

impl QueueError {
    /// Create a connection error
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection(reason.into())
    }

    /// Create a backend operation error
    pub fn backend(op: &'static str, queue: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            op,
            queue: queue.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Named FIFO queues of opaque byte payloads
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Push a payload onto the tail of a queue
    async fn enqueue(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()>;

    /// Pop the head of a queue, waiting up to `timeout` for an item
    ///
    /// `None` means the queue stayed empty for the whole timeout; this is
    /// a normal idle outcome, not an error.
    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Vec<u8>>>;

    /// Number of payloads currently waiting on a queue
    async fn len(&self, queue: &str) -> QueueResult<usize>;

    /// Drop every payload waiting on a queue
    async fn clear(&self, queue: &str) -> QueueResult<()>;
}

// ============================================================================
// In-Memory Queue
// ============================================================================

/// In-process [`TaskQueue`] backed by per-name `VecDeque`s
///
/// Dequeue parks on a [`Notify`] so waiters wake promptly when a payload
/// arrives instead of polling.
#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    notify: Notify,
}

impl MemoryQueue {
    /// Create a new empty queue set
    pub fn new() -> Self {
        Self::default()
    }

    fn pop(&self, queue: &str) -> Option<Vec<u8>> {
        let mut queues = self.queues.lock().unwrap();
        queues.get_mut(queue).and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()> {
        {
            let mut queues = self.queues.lock().unwrap();
            queues.entry(queue.to_string()).or_default().push_back(payload);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking so a concurrent enqueue
            // between the check and the await cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self.pop(queue) {
                return Ok(Some(payload));
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn len(&self, queue: &str) -> QueueResult<usize> {
        let queues = self.queues.lock().unwrap();
        Ok(queues.get(queue).map_or(0, |q| q.len()))
    }

    async fn clear(&self, queue: &str) -> QueueResult<()> {
        let mut queues = self.queues.lock().unwrap();
        queues.remove(queue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_enqueue_dequeue_fifo() {
        let queue = MemoryQueue::new();

        queue.enqueue("task:scrape", b"one".to_vec()).await.unwrap();
        queue.enqueue("task:scrape", b"two".to_vec()).await.unwrap();

        let first = queue
            .dequeue("task:scrape", Duration::from_millis(10))
            .await
            .unwrap();
        let second = queue
            .dequeue("task:scrape", Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(first.as_deref(), Some(b"one".as_slice()));
        assert_eq!(second.as_deref(), Some(b"two".as_slice()));
    }

    #[tokio::test]
    async fn test_dequeue_times_out_on_empty_queue() {
        let queue = MemoryQueue::new();

        let result = queue
            .dequeue("task:scrape", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_concurrent_enqueue() {
        let queue = Arc::new(MemoryQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue("task:scrape", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue("task:scrape", b"late".to_vec()).await.unwrap();

        let result = consumer.await.unwrap().unwrap();
        assert_eq!(result.as_deref(), Some(b"late".as_slice()));
    }

    #[tokio::test]
    async fn test_len_and_clear() {
        let queue = MemoryQueue::new();

        assert_eq!(queue.len("task:scrape").await.unwrap(), 0);

        queue.enqueue("task:scrape", b"a".to_vec()).await.unwrap();
        queue.enqueue("task:scrape", b"b".to_vec()).await.unwrap();
        assert_eq!(queue.len("task:scrape").await.unwrap(), 2);

        queue.clear("task:scrape").await.unwrap();
        assert_eq!(queue.len("task:scrape").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let queue = MemoryQueue::new();

        queue.enqueue("task:scrape", b"s".to_vec()).await.unwrap();
        queue.enqueue("task:consume", b"c".to_vec()).await.unwrap();

        assert_eq!(queue.len("task:scrape").await.unwrap(), 1);
        assert_eq!(queue.len("task:consume").await.unwrap(), 1);

        let item = queue
            .dequeue("task:consume", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(item.as_deref(), Some(b"c".as_slice()));
        assert_eq!(queue.len("task:scrape").await.unwrap(), 1);
    }
}
