//! Redis broker adapter
//!
//! Queues are plain Redis lists: enqueue is RPUSH, blocking dequeue is
//! BLPOP with a timeout, length is LLEN, clear is DEL. Connections come
//! from a deadpool pool sized by [`RedisConfig::pool_size`].

use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use std::time::Duration;

use super::{QueueError, QueueResult, TaskQueue};
use crate::config::RedisConfig;

/// Redis-backed [`TaskQueue`]
pub struct RedisQueue {
    pool: Pool,
}

impl RedisQueue {
    /// Create a queue adapter from broker settings
    ///
    /// The pool is created lazily; connectivity is only verified by
    /// [`RedisQueue::ping`] or the first operation.
    pub fn new(config: &RedisConfig) -> QueueResult<Self> {
        let mut pool_config = Config::from_url(&config.url);
        pool_config.pool = Some(PoolConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Verify broker connectivity with a PING
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::connection(e.to_string()))
    }

    async fn connection(&self) -> QueueResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::connection(e.to_string()))
    }
}

#[async_trait::async_trait]
impl TaskQueue for RedisQueue {
    async fn enqueue(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        conn.rpush::<_, _, i64>(queue, payload)
            .await
            .map_err(|e| QueueError::backend("enqueue", queue, e.to_string()))?;
        Ok(())
    }

    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;

        // BLPOP with timeout 0 would block forever; treat a zero timeout
        // as a non-blocking poll instead.
        if timeout.is_zero() {
            let payload: Option<Vec<u8>> = conn
                .lpop(queue, None)
                .await
                .map_err(|e| QueueError::backend("dequeue", queue, e.to_string()))?;
            return Ok(payload);
        }

        let reply: Option<(String, Vec<u8>)> = conn
            .blpop(queue, timeout.as_secs_f64())
            .await
            .map_err(|e| QueueError::backend("dequeue", queue, e.to_string()))?;

        Ok(reply.map(|(_, payload)| payload))
    }

    async fn len(&self, queue: &str) -> QueueResult<usize> {
        let mut conn = self.connection().await?;
        let len: i64 = conn
            .llen(queue)
            .await
            .map_err(|e| QueueError::backend("len", queue, e.to_string()))?;
        Ok(len.max(0) as usize)
    }

    async fn clear(&self, queue: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, i64>(queue)
            .await
            .map_err(|e| QueueError::backend("clear", queue, e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation_from_config() {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size: 2,
        };
        assert!(RedisQueue::new(&config).is_ok());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RedisConfig {
            url: "not-a-url".to_string(),
            pool_size: 2,
        };
        assert!(RedisQueue::new(&config).is_err());
    }
}
