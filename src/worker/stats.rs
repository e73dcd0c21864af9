//! Per-worker operational metrics
//!
//! Counters are atomic increments; timestamp and flag fields live behind
//! the stats' own lock. Updates and snapshots both hold the lock so that
//! the conservation invariant (processed == successful + failed) is true
//! at every observable snapshot.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Operational metrics for one worker
#[derive(Debug, Default)]
pub struct Stats {
    items_processed: AtomicU64,
    items_successful: AtomicU64,
    items_failed: AtomicU64,
    processing_time_ns: AtomicU64,
    state: Mutex<TimeState>,
}

#[derive(Debug, Default)]
struct TimeState {
    start_time: Option<DateTime<Utc>>,
    stop_time: Option<DateTime<Utc>>,
    last_processed_at: Option<DateTime<Utc>>,
    is_running: bool,
    loop_started: Option<Instant>,
}

impl Stats {
    /// Create a zeroed stats instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a processing loop iteration
    ///
    /// The first call also records the worker's wall-clock start time.
    pub fn record_start(&self) {
        let mut state = self.state.lock().unwrap();
        if state.start_time.is_none() {
            state.start_time = Some(Utc::now());
        }
        state.is_running = true;
        state.loop_started = Some(Instant::now());
    }

    /// Mark the worker as stopped
    pub fn record_stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stop_time = Some(Utc::now());
        state.is_running = false;
    }

    /// Record one successfully processed item
    pub fn record_success(&self) {
        self.record_item(&self.items_successful);
    }

    /// Record one failed item
    pub fn record_failure(&self) {
        self.record_item(&self.items_failed);
    }

    fn record_item(&self, outcome: &AtomicU64) {
        let mut state = self.state.lock().unwrap();
        outcome.fetch_add(1, Ordering::Relaxed);
        self.items_processed.fetch_add(1, Ordering::Relaxed);
        if let Some(started) = state.loop_started {
            self.processing_time_ns
                .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
        }
        state.last_processed_at = Some(Utc::now());
    }

    /// Take a consistent copy of the current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        let state = self.state.lock().unwrap();
        StatsSnapshot {
            items_processed: self.items_processed.load(Ordering::Relaxed),
            items_successful: self.items_successful.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            processing_time: Duration::from_nanos(self.processing_time_ns.load(Ordering::Relaxed)),
            start_time: state.start_time,
            stop_time: state.stop_time,
            last_processed_at: state.last_processed_at,
            is_running: state.is_running,
        }
    }

    /// Total runtime: now minus start while running, stop minus start after
    pub fn total_runtime(&self) -> Duration {
        let state = self.state.lock().unwrap();
        let Some(start) = state.start_time else {
            return Duration::ZERO;
        };

        let end = if state.is_running {
            Utc::now()
        } else {
            match state.stop_time {
                Some(stop) => stop,
                None => return Duration::ZERO,
            }
        };

        (end - start).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Point-in-time copy of a worker's stats
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub items_processed: u64,
    pub items_successful: u64,
    pub items_failed: u64,
    pub processing_time: Duration,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub is_running: bool,
}
