//! Cron-driven job scheduler
//!
//! A registry of named jobs, each bound to a six-field cron expression
//! (seconds precision) and an async handler. A driver task evaluates the
//! schedules and dispatches each due firing onto its own task, so a slow
//! handler never delays other jobs.
//!
//! # Execution protocol
//!
//! Per firing: the job is claimed under the registry lock (a firing that
//! finds the job already running is skipped - single-flight), a child
//! cancellation scope is derived from the scheduler's root scope and
//! bounded by the job's timeout, the handler runs with the lock released,
//! and the outcome is recorded along with the recomputed next run time.
//!
//! Jobs with a non-zero retry count get extra handler attempts with
//! exponential backoff; the recorded status reflects the final attempt.
//!
//! Stopping the scheduler cancels the root scope, which cascades into
//! every in-flight handler, and halts the driver.

pub mod error;

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::Result;

pub use error::{SchedulerError, SchedulerResult};

/// How often the driver re-evaluates job schedules
const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Base delay for retry backoff
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Cap on the exponential retry backoff
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Boxed async job handler taking the firing's cancellation scope
pub type JobHandler = Arc<
    dyn Fn(CancellationToken) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync,
>;

/// Wrap an async closure into a [`JobHandler`]
fn into_handler<F, Fut>(f: F) -> JobHandler
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |scope| Box::pin(f(scope)))
}

/// Current state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// String form used in logs and status output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered job
struct Job {
    name: String,
    cron_expr: String,
    /// None while the job is paused
    schedule: Option<Schedule>,
    /// Zero means inherit the scheduler default
    timeout: Duration,
    retry_count: u32,
    description: String,
    handler: JobHandler,
    status: JobStatus,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    last_run_time: Option<Duration>,
    last_error: Option<String>,
}

/// Read-through copy of a job's observable state
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub name: String,
    pub cron_expr: String,
    pub status: JobStatus,
    pub paused: bool,
    pub description: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run_time: Option<Duration>,
    pub last_error: Option<String>,
}

impl Job {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            name: self.name.clone(),
            cron_expr: self.cron_expr.clone(),
            status: self.status,
            paused: self.schedule.is_none(),
            description: self.description.clone(),
            last_run: self.last_run,
            next_run: self.next_run,
            last_run_time: self.last_run_time,
            last_error: self.last_error.clone(),
        }
    }
}

struct Inner {
    jobs: RwLock<HashMap<String, Job>>,
    root: CancellationToken,
    default_timeout: Duration,
}

/// Cron-expression-driven registry of named jobs
pub struct Scheduler {
    inner: Arc<Inner>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler with a global default timeout (zero disables it)
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                root: CancellationToken::new(),
                default_timeout,
            }),
            driver: Mutex::new(None),
        }
    }

    /// Create a scheduler and install a placeholder job for every enabled
    /// job declaration; handlers are bound later via [`register_handler`]
    ///
    /// [`register_handler`]: Scheduler::register_handler
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        let scheduler = Self::new(config.default_timeout());

        for job in config.jobs.iter().filter(|j| j.enabled) {
            let name = job.name.clone();
            let placeholder = into_handler(move |_scope| {
                let name = name.clone();
                async move {
                    Err(SchedulerError::HandlerNotRegistered(name).into())
                }
            });

            scheduler.add_job_inner(
                &job.name,
                &job.cron_expr,
                job.timeout(),
                job.retry_count,
                &job.description,
                placeholder,
            )?;
        }

        tracing::info!(
            jobs = scheduler.inner.jobs.read().unwrap().len(),
            "scheduler initialized"
        );
        Ok(scheduler)
    }

    /// The root cancellation scope; ancestor of every handler scope
    pub fn root_scope(&self) -> CancellationToken {
        self.inner.root.clone()
    }

    /// Register and schedule a new job
    pub fn add_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timeout: Duration,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_job_inner(name, cron_expr, timeout, 0, "", into_handler(handler))
    }

    fn add_job_inner(
        &self,
        name: &str,
        cron_expr: &str,
        timeout: Duration,
        retry_count: u32,
        description: &str,
        handler: JobHandler,
    ) -> Result<()> {
        let schedule = parse_cron(cron_expr)?;

        let mut jobs = self.inner.jobs.write().unwrap();
        if jobs.contains_key(name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()).into());
        }

        let next_run = schedule.after(&Utc::now()).next();
        jobs.insert(
            name.to_string(),
            Job {
                name: name.to_string(),
                cron_expr: cron_expr.to_string(),
                schedule: Some(schedule),
                timeout,
                retry_count,
                description: description.to_string(),
                handler,
                status: JobStatus::Idle,
                last_run: None,
                next_run,
                last_run_time: None,
                last_error: None,
            },
        );

        tracing::debug!(job = name, cron = cron_expr, "job added");
        Ok(())
    }

    /// Bind a handler to a pre-declared placeholder job
    pub fn register_handler<F, Fut>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut jobs = self.inner.jobs.write().unwrap();
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        job.handler = into_handler(handler);
        tracing::debug!(job = name, "handler registered");
        Ok(())
    }

    /// Fire a job immediately on a fresh execution task
    ///
    /// Subject to single-flight: a job that is currently running yields
    /// [`SchedulerError::AlreadyRunning`].
    pub fn run_job(&self, name: &str) -> Result<()> {
        {
            let jobs = self.inner.jobs.read().unwrap();
            let job = jobs
                .get(name)
                .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
            if job.status == JobStatus::Running {
                return Err(SchedulerError::AlreadyRunning(name.to_string()).into());
            }
        }

        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        tokio::spawn(async move {
            Inner::execute(inner, name).await;
        });
        Ok(())
    }

    /// Remove a job from the registry and the schedule
    pub fn remove_job(&self, name: &str) -> Result<()> {
        let mut jobs = self.inner.jobs.write().unwrap();
        if jobs.remove(name).is_none() {
            return Err(SchedulerError::UnknownJob(name.to_string()).into());
        }
        tracing::debug!(job = name, "job removed");
        Ok(())
    }

    /// Temporarily take a job off the schedule
    pub fn pause_job(&self, name: &str) -> Result<()> {
        let mut jobs = self.inner.jobs.write().unwrap();
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        job.schedule = None;
        job.next_run = None;
        job.status = JobStatus::Idle;
        tracing::debug!(job = name, "job paused");
        Ok(())
    }

    /// Put a paused job back on the schedule with a cron expression
    pub fn resume_job(&self, name: &str, cron_expr: &str) -> Result<()> {
        let schedule = parse_cron(cron_expr)?;

        let mut jobs = self.inner.jobs.write().unwrap();
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        job.next_run = schedule.after(&Utc::now()).next();
        job.schedule = Some(schedule);
        job.cron_expr = cron_expr.to_string();
        job.status = JobStatus::Idle;
        tracing::debug!(job = name, cron = cron_expr, "job resumed");
        Ok(())
    }

    /// Read-through snapshot of one job
    pub fn job_status(&self, name: &str) -> Result<JobSnapshot> {
        let jobs = self.inner.jobs.read().unwrap();
        jobs.get(name)
            .map(Job::snapshot)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()).into())
    }

    /// Snapshots of every job, sorted by name
    pub fn all_jobs(&self) -> Vec<JobSnapshot> {
        let jobs = self.inner.jobs.read().unwrap();
        let mut snapshots: Vec<_> = jobs.values().map(Job::snapshot).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Start the driver; repeated calls are no-ops
    pub fn start(&self) {
        let mut driver = self.driver.lock().unwrap();
        if driver.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *driver = Some(tokio::spawn(async move {
            Inner::drive(inner).await;
        }));
        tracing::info!("scheduler started");
    }

    /// Stop the scheduler: cancel the root scope and halt the driver
    ///
    /// Cancellation cascades into any in-flight handlers. The scheduler
    /// cannot be restarted afterwards.
    pub fn stop(&self) {
        self.inner.root.cancel();
        tracing::info!("scheduler stopped");
    }
}

impl Inner {
    /// Driver loop: evaluate schedules and dispatch due firings
    async fn drive(inner: Arc<Inner>) {
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = inner.root.cancelled() => break,
                _ = tick.tick() => {}
            }

            for name in inner.claim_due(Utc::now()) {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    Inner::execute(inner, name).await;
                });
            }
        }

        tracing::debug!("scheduler driver exited");
    }

    /// Collect jobs whose next run is due, advancing their next-run claim
    ///
    /// Jobs that are still running are left alone: the firing is skipped
    /// and their next run is recomputed when the in-flight execution
    /// finishes.
    fn claim_due(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut jobs = self.jobs.write().unwrap();
        let mut due = Vec::new();

        for job in jobs.values_mut() {
            if job.status == JobStatus::Running {
                continue;
            }
            let Some(schedule) = job.schedule.as_ref() else {
                continue;
            };
            if job.next_run.is_some_and(|at| at <= now) {
                job.next_run = schedule.after(&now).next();
                due.push(job.name.clone());
            }
        }

        due
    }

    /// Run one firing of a job through the execution protocol
    async fn execute(inner: Arc<Inner>, name: String) {
        // Claim the job under the lock; skip if an execution is in flight
        let (handler, timeout, retry_count) = {
            let mut jobs = inner.jobs.write().unwrap();
            let Some(job) = jobs.get_mut(&name) else {
                return;
            };
            if job.status == JobStatus::Running {
                tracing::debug!(job = %name, "firing skipped, already running");
                return;
            }
            job.status = JobStatus::Running;
            job.last_run = Some(Utc::now());
            (Arc::clone(&job.handler), job.timeout, job.retry_count)
        };

        let timeout = if timeout.is_zero() {
            inner.default_timeout
        } else {
            timeout
        };

        // The firing scope is a child of the root; a non-zero timeout arms
        // a watchdog that cancels it at the deadline.
        let firing = inner.root.child_token();
        if !timeout.is_zero() {
            let watchdog = firing.clone();
            let job_name = name.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = watchdog.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        tracing::warn!(job = %job_name, ?timeout, "job deadline reached, cancelling");
                        watchdog.cancel();
                    }
                }
            });
        }

        tracing::info!(job = %name, "job execution started");
        let started = Instant::now();
        let result = Self::run_attempts(&firing, &handler, retry_count).await;
        let elapsed = started.elapsed();
        firing.cancel();

        // Record the outcome and recompute the schedule
        let mut jobs = inner.jobs.write().unwrap();
        let Some(job) = jobs.get_mut(&name) else {
            return;
        };

        job.last_run_time = Some(elapsed);
        match result {
            Ok(()) => {
                job.status = JobStatus::Succeeded;
                job.last_error = None;
                tracing::info!(job = %name, ?elapsed, "job succeeded");
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                job.last_error = Some(e.to_string());
                tracing::warn!(job = %name, ?elapsed, error = %e, "job failed");
            }
        }
        job.next_run = job
            .schedule
            .as_ref()
            .and_then(|s| s.after(&Utc::now()).next());
    }

    /// Invoke the handler, retrying with exponential backoff
    ///
    /// Each attempt gets a fresh child scope; the whole firing is bounded
    /// by the firing scope and its deadline.
    async fn run_attempts(
        firing: &CancellationToken,
        handler: &JobHandler,
        retry_count: u32,
    ) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            let scope = firing.child_token();
            match handler(scope).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt >= retry_count || firing.is_cancelled() {
                        return Err(e);
                    }
                    attempt += 1;
                    let delay = retry_backoff(attempt);
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "job attempt failed, backing off");
                    tokio::select! {
                        _ = firing.cancelled() => return Err(e),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Exponential backoff for retry attempt `n` (1-based)
fn retry_backoff(attempt: u32) -> Duration {
    let factor = 1u32 << (attempt - 1).min(16);
    RETRY_BASE_DELAY
        .saturating_mul(factor)
        .min(RETRY_MAX_DELAY)
}

/// Parse a six-field cron expression (seconds precision)
fn parse_cron(expr: &str) -> SchedulerResult<Schedule> {
    Schedule::from_str(expr).map_err(|e| SchedulerError::invalid_cron(expr, e.to_string()))
}
