//! Fixed-capacity parallel worker group
//!
//! `start` launches every worker on its own task and returns immediately;
//! `stop` + `wait` is the shutdown pair. `stop` only flips the workers'
//! active flags - it never cancels the scope, so a worker parked in a
//! blocking dequeue is unblocked by the caller cancelling the scope.

use std::mem;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{StatsSnapshot, Worker, WorkerError};

/// A bounded collection of workers running in parallel
pub struct Pool {
    capacity: usize,
    state: Mutex<PoolState>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

struct PoolState {
    workers: Vec<Arc<dyn Worker>>,
    running: bool,
}

impl Pool {
    /// Create an empty pool with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState {
                workers: Vec::with_capacity(capacity),
                running: false,
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Declared maximum worker count
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of workers added so far
    pub fn worker_count(&self) -> usize {
        self.state.lock().unwrap().workers.len()
    }

    /// Whether the pool has been started and not yet fully waited on
    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Append a worker
    ///
    /// Workers may only be added while the pool is stopped and below
    /// capacity.
    pub fn add_worker(&self, worker: Arc<dyn Worker>) -> Result<(), WorkerError> {
        let mut state = self.state.lock().unwrap();

        if state.running {
            return Err(WorkerError::PoolRunning);
        }
        if state.workers.len() >= self.capacity {
            return Err(WorkerError::PoolFull(self.capacity));
        }

        state.workers.push(worker);
        Ok(())
    }

    /// Launch every worker on its own task, bounded by `scope`
    ///
    /// Returns before the workers terminate.
    pub fn start(&self, scope: CancellationToken) -> Result<(), WorkerError> {
        let workers = {
            let mut state = self.state.lock().unwrap();
            if state.running {
                return Err(WorkerError::PoolAlreadyRunning);
            }
            state.running = true;
            state.workers.clone()
        };

        let mut handles = self.handles.lock().unwrap();
        for worker in workers {
            let scope = scope.clone();
            handles.push(tokio::spawn(async move {
                tracing::info!(worker = worker.name(), "starting worker");
                if let Err(e) = worker.start(scope).await {
                    tracing::warn!(worker = worker.name(), error = %e, "worker exited with error");
                }
                tracing::info!(worker = worker.name(), "worker finished");
            }));
        }

        Ok(())
    }

    /// Request every worker to deactivate, in declaration order
    ///
    /// Does not cancel the scope and does not wait; repeated calls are
    /// harmless no-ops.
    pub fn stop(&self) {
        let workers = {
            let state = self.state.lock().unwrap();
            if !state.running {
                return;
            }
            state.workers.clone()
        };

        for worker in workers {
            if let Err(e) = worker.stop() {
                tracing::warn!(worker = worker.name(), error = %e, "error stopping worker");
            }
        }
    }

    /// Block until every launched worker task has returned
    pub async fn wait(&self) {
        let handles = mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
        self.state.lock().unwrap().running = false;
    }

    /// Stats snapshots for every worker, in declaration order
    pub fn stats(&self) -> Vec<StatsSnapshot> {
        self.state
            .lock()
            .unwrap()
            .workers
            .iter()
            .map(|w| w.stats())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::worker::{BaseWorker, WorkerKind};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Worker that idles until deactivated or cancelled
    #[derive(Debug)]
    struct IdleWorker {
        base: BaseWorker,
    }

    impl IdleWorker {
        fn new(id: usize) -> Arc<Self> {
            Arc::new(Self {
                base: BaseWorker::new(id, WorkerKind::Consumer),
            })
        }
    }

    #[async_trait]
    impl Worker for IdleWorker {
        async fn start(&self, scope: CancellationToken) -> Result<()> {
            if !self.base.set_active(true) {
                return Err(WorkerError::AlreadyRunning(self.base.name().to_string()).into());
            }
            self.base.stats.record_start();
            while self.base.is_active() && !scope.is_cancelled() {
                tokio::select! {
                    _ = scope.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                }
            }
            self.base.stats.record_stop();
            self.base.set_active(false);
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
            self.base.kind()
        }

        fn stats(&self) -> StatsSnapshot {
            self.base.stats.snapshot()
        }
    }

    #[test]
    fn test_add_worker_respects_capacity() {
        let pool = Pool::new(2);

        pool.add_worker(IdleWorker::new(0)).unwrap();
        pool.add_worker(IdleWorker::new(1)).unwrap();

        let err = pool.add_worker(IdleWorker::new(2)).unwrap_err();
        assert!(matches!(err, WorkerError::PoolFull(2)));
        assert_eq!(pool.worker_count(), 2);
    }

    #[tokio::test]
    async fn test_add_worker_rejected_while_running() {
        let pool = Pool::new(3);
        pool.add_worker(IdleWorker::new(0)).unwrap();

        let scope = CancellationToken::new();
        pool.start(scope.clone()).unwrap();

        let err = pool.add_worker(IdleWorker::new(1)).unwrap_err();
        assert!(matches!(err, WorkerError::PoolRunning));

        pool.stop();
        pool.wait().await;
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let pool = Pool::new(1);
        pool.add_worker(IdleWorker::new(0)).unwrap();

        let scope = CancellationToken::new();
        pool.start(scope.clone()).unwrap();

        let err = pool.start(scope.clone()).unwrap_err();
        assert!(matches!(err, WorkerError::PoolAlreadyRunning));

        pool.stop();
        pool.wait().await;
    }

    #[tokio::test]
    async fn test_stop_wait_shutdown_pair() {
        let pool = Pool::new(4);
        for i in 0..4 {
            pool.add_worker(IdleWorker::new(i)).unwrap();
        }

        let scope = CancellationToken::new();
        pool.start(scope.clone()).unwrap();
        assert!(pool.is_running());

        tokio::time::sleep(Duration::from_millis(30)).await;

        pool.stop();
        tokio::time::timeout(Duration::from_secs(1), pool.wait())
            .await
            .expect("pool did not shut down");

        assert!(!pool.is_running());
        for stats in pool.stats() {
            assert!(!stats.is_running);
        }
    }

    #[tokio::test]
    async fn test_repeated_stop_is_idempotent() {
        let pool = Pool::new(1);
        pool.add_worker(IdleWorker::new(0)).unwrap();

        let scope = CancellationToken::new();
        pool.start(scope.clone()).unwrap();

        pool.stop();
        pool.stop();
        pool.wait().await;
        pool.stop();

        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_scope_cancellation_unparks_workers() {
        let pool = Pool::new(2);
        pool.add_worker(IdleWorker::new(0)).unwrap();
        pool.add_worker(IdleWorker::new(1)).unwrap();

        let scope = CancellationToken::new();
        pool.start(scope.clone()).unwrap();

        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), pool.wait())
            .await
            .expect("cancellation did not unblock workers");
    }

    #[tokio::test]
    async fn test_restart_after_full_shutdown() {
        let pool = Pool::new(1);
        pool.add_worker(IdleWorker::new(0)).unwrap();

        let scope = CancellationToken::new();
        pool.start(scope.clone()).unwrap();
        pool.stop();
        pool.wait().await;

        // A fresh cycle is allowed once wait() completed
        let scope2 = CancellationToken::new();
        pool.start(scope2.clone()).unwrap();
        pool.stop();
        pool.wait().await;
    }
}
