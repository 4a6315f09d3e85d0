//! Task scheduler: queue drain, dispatch, completion handling, retries,
//! health ticks, and graceful shutdown.
//!
//! All mutable scheduling state lives behind one `parking_lot` mutex that is
//! never held across an `.await`. Executor calls, backoff sleeps, and the
//! health ticker run as spawned tasks and re-enter the scheduler through
//! short synchronous critical sections.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::core::{
    AgentKind, DistributionStrategy, ExecutionResult, ExecutionStatus, PoolCounters, PoolStats,
    RetryDecision, RetryPolicy, SchedulerError, Task, TaskDistributor, TaskExecutor, TaskId,
    TaskStatus, Worker, WorkerId, WorkerPool, WorkerStatus,
};
use crate::infra::{InMemoryQueue, InMemoryResultStore};
use crate::optimizer::{AgentLoad, LoadBalancer, LoadLease, MetricsProfiler};
use crate::util::clock::now_ms;

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// What one health tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Running attempts abandoned as timed out.
    pub timed_out: usize,
    /// Workers returned from `error` to service.
    pub recovered: usize,
    /// Net change in worker count from auto-scaling.
    pub scaled: isize,
}

struct RunningTask<P> {
    task: Task<P>,
    worker_id: WorkerId,
    attempt: u64,
    started: Instant,
    started_ms: u64,
    _lease: LoadLease,
}

struct SchedulerState<P> {
    queue: InMemoryQueue<P>,
    pool: WorkerPool,
    running: HashMap<TaskId, RunningTask<P>>,
    statuses: HashMap<TaskId, TaskStatus>,
    retrying: HashSet<TaskId>,
}

impl<P> SchedulerState<P> {
    fn outstanding(&self) -> usize {
        self.queue.len() + self.running.len() + self.retrying.len()
    }

    fn is_live(&self, id: &str) -> bool {
        self.statuses.get(id).is_some_and(|s| !s.is_terminal())
    }
}

/// A dispatched attempt, handed to the spawner once the state lock is released.
struct Dispatch<P> {
    task: Task<P>,
    worker: Worker,
    attempt: u64,
}

/// A failed attempt waiting out its backoff before re-entering the queue.
struct PendingRetry<P> {
    task: Task<P>,
    delay: Duration,
}

/// Final details of an attempt that did not succeed.
struct FailedAttempt {
    worker_id: WorkerId,
    started_ms: u64,
    ended_ms: u64,
    duration_ms: u64,
    status: ExecutionStatus,
    error: String,
}

struct Inner<P, R, E, S> {
    config: SchedulerConfig,
    state: Mutex<SchedulerState<P>>,
    results: RwLock<InMemoryResultStore<R>>,
    distributor: TaskDistributor,
    retry: RetryPolicy,
    profiler: Arc<MetricsProfiler>,
    balancer: LoadBalancer,
    counters: PoolCounters,
    next_attempt: AtomicU64,
    executor: E,
    spawner: S,
    shutdown: AtomicBool,
    ticker_running: AtomicBool,
    ticker_stop: watch::Sender<bool>,
    progress: Notify,
    started_at: Instant,
}

/// Priority scheduler over an auto-scaled pool of workers.
///
/// Cloning is cheap and every clone drives the same scheduler.
pub struct TaskScheduler<P, R, E, S> {
    inner: Arc<Inner<P, R, E, S>>,
}

impl<P, R, E, S> Clone for TaskScheduler<P, R, E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R, E, S> TaskScheduler<P, R, E, S>
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: TaskExecutor<P, R>,
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a scheduler with its own metrics profiler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `config` does not validate.
    pub fn new(config: SchedulerConfig, executor: E, spawner: S) -> Result<Self, SchedulerError> {
        let profiler = Arc::new(MetricsProfiler::new(
            config.optimizer.metrics_enabled,
            crate::optimizer::DEFAULT_METRICS_CAPACITY,
        ));
        Self::with_profiler(config, executor, spawner, profiler)
    }

    /// Create a scheduler that records attempt metrics into `profiler`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `config` does not validate.
    pub fn with_profiler(
        config: SchedulerConfig,
        executor: E,
        spawner: S,
        profiler: Arc<MetricsProfiler>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let pool = WorkerPool::from_config(&config.pool);
        let balancer = LoadBalancer::new(config.optimizer.load_balancing);
        for kind in &config.pool.agent_kinds {
            balancer.register(kind.as_str(), kind.priority_weight());
        }
        let (ticker_stop, _) = watch::channel(false);

        info!(
            workers = pool.len(),
            strategy = %config.distribution.strategy,
            max_retries = config.retry.max_retries,
            "task scheduler created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState {
                    queue: InMemoryQueue::new(config.optimizer.queue_max_size),
                    pool,
                    running: HashMap::new(),
                    statuses: HashMap::new(),
                    retrying: HashSet::new(),
                }),
                results: RwLock::new(InMemoryResultStore::new()),
                distributor: TaskDistributor::new(
                    config.distribution.strategy,
                    config.distribution.skill_map.clone(),
                ),
                retry: RetryPolicy::from_config(&config.retry),
                profiler,
                balancer,
                counters: PoolCounters::default(),
                next_attempt: AtomicU64::new(1),
                executor,
                spawner,
                shutdown: AtomicBool::new(false),
                ticker_running: AtomicBool::new(false),
                ticker_stop,
                progress: Notify::new(),
                started_at: Instant::now(),
                config,
            }),
        })
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Queue one task and dispatch whatever can run.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::PoolShutdown` after [`shutdown`](Self::shutdown)
    /// - `SchedulerError::DuplicateTask` if the id is queued, running, or retrying
    /// - `SchedulerError::QueueFull` at `queue_max_size`
    pub fn add_task(&self, task: Task<P>) -> Result<(), SchedulerError> {
        self.add_tasks(vec![task])
    }

    /// Queue several tasks atomically: either all are accepted or none.
    ///
    /// # Errors
    ///
    /// Same as [`add_task`](Self::add_task), checked for the whole batch.
    pub fn add_tasks(&self, tasks: Vec<Task<P>>) -> Result<(), SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::PoolShutdown);
        }
        let count = tasks.len();
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let free = state.queue.max_depth().saturating_sub(state.queue.len());
            if count > free {
                warn!(requested = count, free, "submission rejected: queue full");
                return Err(SchedulerError::QueueFull(format!(
                    "{count} tasks requested, {free} slots free"
                )));
            }
            let mut seen = HashSet::with_capacity(count);
            for task in &tasks {
                if state.is_live(&task.id) || !seen.insert(task.id.as_str()) {
                    return Err(SchedulerError::DuplicateTask(task.id.clone()));
                }
            }

            for mut task in tasks {
                task.status = TaskStatus::Pending;
                state.statuses.insert(task.id.clone(), TaskStatus::Pending);
                debug!(task_id = %task.id, priority = task.priority, "task queued");
                state.queue.enqueue(task)?;
            }
        }
        self.inner
            .counters
            .submitted_tasks
            .fetch_add(count as u64, Ordering::Relaxed);
        info!(count, "tasks submitted");
        self.drain();
        Ok(())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Dispatch queued tasks until none is ready or no worker is eligible.
    pub fn drain(&self) {
        let dispatches = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            self.cancel_blocked(state);

            let mut dispatches = Vec::new();
            loop {
                let statuses = &state.statuses;
                let Some((task_id, task_type)) = state
                    .queue
                    .iter()
                    .find(|t| dependencies_met(t, statuses))
                    .map(|t| (t.id.clone(), t.task_type.clone()))
                else {
                    break;
                };
                let Some(worker_id) = self
                    .inner
                    .distributor
                    .select(&task_type, state.pool.workers())
                else {
                    debug!(queued = state.queue.len(), "no eligible worker, waiting");
                    break;
                };
                let Some(worker) = state.pool.get_mut(&worker_id) else {
                    break;
                };
                if !worker.assign() {
                    break;
                }
                let worker = worker.clone();
                let Some(mut task) = state.queue.take_first(|t| t.id == task_id) else {
                    break;
                };

                task.status = TaskStatus::Processing;
                state.statuses.insert(task.id.clone(), TaskStatus::Processing);
                let attempt = self.inner.next_attempt.fetch_add(1, Ordering::Relaxed);
                let lease = self.inner.balancer.acquire(worker.agent_kind.as_str());
                state.running.insert(
                    task.id.clone(),
                    RunningTask {
                        task: task.clone(),
                        worker_id: worker.id.clone(),
                        attempt,
                        started: Instant::now(),
                        started_ms: now_ms(),
                        _lease: lease,
                    },
                );
                debug!(
                    task_id = %task.id,
                    worker_id = %worker.id,
                    attempt = task.retry_count + 1,
                    "task dispatched"
                );
                dispatches.push(Dispatch {
                    task,
                    worker,
                    attempt,
                });
            }
            dispatches
        };

        for dispatch in dispatches {
            self.spawn_attempt(dispatch);
        }
    }

    /// Cancel queued tasks whose dependencies can no longer complete.
    fn cancel_blocked(&self, state: &mut SchedulerState<P>) {
        loop {
            let statuses = &state.statuses;
            let blocked = state.queue.remove_where(|t| failed_dependency(t, statuses).is_some());
            if blocked.is_empty() {
                return;
            }
            let now = now_ms();
            let mut results = self.inner.results.write();
            for task in blocked {
                let reason = failed_dependency(&task, &state.statuses)
                    .map_or_else(String::new, |d| format!("dependency {d} did not complete"));
                warn!(task_id = %task.id, reason = %reason, "task cancelled");
                state.statuses.insert(task.id.clone(), TaskStatus::Cancelled);
                self.inner
                    .counters
                    .cancelled_tasks
                    .fetch_add(1, Ordering::Relaxed);
                results.record(ExecutionResult {
                    task_id: task.id,
                    worker_id: None,
                    status: ExecutionStatus::Cancelled,
                    start_time_ms: now,
                    end_time_ms: now,
                    duration_ms: 0,
                    retries: task.retry_count,
                    data: None,
                    error: Some(reason),
                });
            }
        }
    }

    fn spawn_attempt(&self, dispatch: Dispatch<P>) {
        let this = self.clone();
        let executor = self.inner.executor.clone();
        self.inner.spawner.spawn(async move {
            let Dispatch {
                task,
                worker,
                attempt,
            } = dispatch;
            let task_id = task.id.clone();
            let op_name = format!("task:{}", task.task_type);
            let profiler = Arc::clone(&this.inner.profiler);

            let outcome = profiler
                .profile(&op_name, async move {
                    let failure = match AssertUnwindSafe(executor.execute(task, worker))
                        .catch_unwind()
                        .await
                    {
                        Ok(Ok(data)) => return Ok(data),
                        Ok(Err(e)) => SchedulerError::ExecutionFailed(format!("{e:#}")),
                        Err(panic) => SchedulerError::ExecutionFailed(format!(
                            "executor panicked: {}",
                            panic_message(&*panic)
                        )),
                    };
                    Err(failure.to_string())
                })
                .await;

            this.finish_attempt(&task_id, attempt, outcome);
        });
    }

    // ========================================================================
    // Completion and retries
    // ========================================================================

    /// Apply the outcome of attempt `attempt` of `task_id`.
    ///
    /// Returns `false` and changes nothing when the attempt is no longer
    /// current, e.g. it was abandoned after a timeout or already completed.
    pub(crate) fn finish_attempt(
        &self,
        task_id: &str,
        attempt: u64,
        outcome: Result<R, String>,
    ) -> bool {
        let retry = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if state.running.get(task_id).is_none_or(|r| r.attempt != attempt) {
                debug!(task_id, attempt, "ignoring stale completion");
                return false;
            }
            let Some(running) = state.running.remove(task_id) else {
                return false;
            };
            let ended_ms = now_ms();
            let duration_ms = elapsed_ms(running.started);
            let success = outcome.is_ok();
            if let Some(worker) = state.pool.get_mut(&running.worker_id) {
                worker.release(success);
            }
            let RunningTask {
                task,
                worker_id,
                started_ms,
                ..
            } = running;

            match outcome {
                Ok(data) => {
                    state.statuses.insert(task.id.clone(), TaskStatus::Completed);
                    self.inner.counters.record_success(duration_ms);
                    info!(
                        task_id = %task.id,
                        worker_id = %worker_id,
                        attempt = task.retry_count + 1,
                        duration_ms,
                        "task completed"
                    );
                    self.inner.results.write().record(ExecutionResult {
                        task_id: task.id,
                        worker_id: Some(worker_id),
                        status: ExecutionStatus::Success,
                        start_time_ms: started_ms,
                        end_time_ms: ended_ms,
                        duration_ms,
                        retries: task.retry_count,
                        data: Some(data),
                        error: None,
                    });
                    None
                }
                Err(error) => {
                    warn!(
                        task_id = %task.id,
                        worker_id = %worker_id,
                        attempt = task.retry_count + 1,
                        error = %error,
                        "task attempt failed"
                    );
                    self.after_failure(
                        state,
                        task,
                        FailedAttempt {
                            worker_id,
                            started_ms,
                            ended_ms,
                            duration_ms,
                            status: ExecutionStatus::Failed,
                            error,
                        },
                    )
                }
            }
        };

        if let Some(retry) = retry {
            self.schedule_retry(retry);
        }
        self.drain();
        self.inner.progress.notify_waiters();
        true
    }

    /// Route a failed or timed-out attempt to a retry or a terminal failure.
    fn after_failure(
        &self,
        state: &mut SchedulerState<P>,
        task: Task<P>,
        attempt: FailedAttempt,
    ) -> Option<PendingRetry<P>> {
        match self.inner.retry.decide(task.retry_count) {
            RetryDecision::Retry { delay } => {
                state.statuses.insert(task.id.clone(), TaskStatus::Pending);
                state.retrying.insert(task.id.clone());
                self.inner.counters.retries.fetch_add(1, Ordering::Relaxed);
                info!(
                    task_id = %task.id,
                    retry = task.retry_count + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling retry"
                );
                Some(PendingRetry { task, delay })
            }
            RetryDecision::GiveUp => {
                state.statuses.insert(task.id.clone(), TaskStatus::Failed);
                self.inner.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                error!(
                    task_id = %task.id,
                    worker_id = %attempt.worker_id,
                    retries = task.retry_count,
                    error = %attempt.error,
                    "task failed permanently"
                );
                self.inner.results.write().record(ExecutionResult {
                    task_id: task.id,
                    worker_id: Some(attempt.worker_id),
                    status: attempt.status,
                    start_time_ms: attempt.started_ms,
                    end_time_ms: attempt.ended_ms,
                    duration_ms: attempt.duration_ms,
                    retries: task.retry_count,
                    data: None,
                    error: Some(attempt.error),
                });
                None
            }
        }
    }

    fn schedule_retry(&self, retry: PendingRetry<P>) {
        let this = self.clone();
        self.inner.spawner.spawn(async move {
            tokio::time::sleep(retry.delay).await;
            this.requeue_retry(retry.task);
        });
    }

    fn requeue_retry(&self, mut task: Task<P>) {
        {
            let mut state = self.inner.state.lock();
            state.retrying.remove(&task.id);
            task.retry_count += 1;
            task.status = TaskStatus::Pending;
            debug!(task_id = %task.id, retry_count = task.retry_count, "retry requeued");
            state.queue.requeue_front(task);
        }
        self.drain();
        self.inner.progress.notify_waiters();
    }

    // ========================================================================
    // Health ticks
    // ========================================================================

    /// Run one health tick: abandon timed-out attempts, recover errored
    /// workers, auto-scale, then dispatch.
    pub fn run_health_check(&self) -> HealthReport {
        let pool_cfg = &self.inner.config.pool;
        let (report, retries) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let (retries, timed_out) = self.scan_timeouts(state);
            let recovered = state.pool.recover_errored(pool_cfg.error_recovery_ticks);
            for worker_id in &recovered {
                info!(worker_id = %worker_id, "worker recovered from error");
            }
            let scaled = if pool_cfg.auto_scale {
                state.pool.auto_scale(pool_cfg)
            } else {
                0
            };
            let report = HealthReport {
                timed_out,
                recovered: recovered.len(),
                scaled,
            };
            (report, retries)
        };

        for retry in retries {
            self.schedule_retry(retry);
        }
        self.drain();
        self.inner.progress.notify_waiters();
        debug!(?report, "health check complete");
        report
    }

    fn scan_timeouts(&self, state: &mut SchedulerState<P>) -> (Vec<PendingRetry<P>>, usize) {
        let timeout = Duration::from_millis(self.inner.config.pool.worker_timeout_ms);
        let expired: Vec<TaskId> = state
            .running
            .iter()
            .filter(|(_, r)| r.started.elapsed() >= timeout)
            .map(|(id, _)| id.clone())
            .collect();

        let mut retries = Vec::new();
        for task_id in &expired {
            let Some(running) = state.running.remove(task_id) else {
                continue;
            };
            if let Some(worker) = state.pool.get_mut(&running.worker_id) {
                worker.mark_timed_out();
            }
            self.inner
                .counters
                .timed_out_attempts
                .fetch_add(1, Ordering::Relaxed);
            let duration_ms = elapsed_ms(running.started);
            warn!(
                task_id = %task_id,
                worker_id = %running.worker_id,
                attempt = running.task.retry_count + 1,
                elapsed_ms = duration_ms,
                "task attempt timed out"
            );
            state.statuses.insert(task_id.clone(), TaskStatus::Timeout);

            let RunningTask {
                task,
                worker_id,
                started_ms,
                ..
            } = running;
            let failed = FailedAttempt {
                worker_id,
                started_ms,
                ended_ms: now_ms(),
                duration_ms,
                status: ExecutionStatus::Timeout,
                error: SchedulerError::Timeout(task_id.clone()).to_string(),
            };
            if let Some(retry) = self.after_failure(state, task, failed) {
                retries.push(retry);
            }
        }
        (retries, expired.len())
    }

    /// Start the periodic health ticker. Calling it again has no effect.
    ///
    /// The ticker holds a weak reference and stops on shutdown or once every
    /// scheduler handle is dropped.
    pub fn start(&self) {
        if self.inner.ticker_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let weak: Weak<Inner<P, R, E, S>> = Arc::downgrade(&self.inner);
        let mut stop = self.inner.ticker_stop.subscribe();
        let period = Duration::from_millis(self.inner.config.pool.health_check_interval_ms);

        self.inner.spawner.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Self { inner }.run_health_check();
            }
            debug!("health ticker stopped");
        });
        info!(
            interval_ms = self.inner.config.pool.health_check_interval_ms,
            "health ticker started"
        );
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Wait until nothing is queued, running, or waiting to retry.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ShutdownTimeout` with the outstanding count if
    /// work remains at the deadline.
    pub async fn wait_for_completion(&self, timeout: Duration) -> Result<(), SchedulerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.inner.progress.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outstanding = self.inner.state.lock().outstanding();
            if outstanding == 0 {
                return Ok(());
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let outstanding = self.inner.state.lock().outstanding();
                return if outstanding == 0 {
                    Ok(())
                } else {
                    Err(SchedulerError::ShutdownTimeout(outstanding))
                };
            }
        }
    }

    /// Stop health ticks, reject new submissions, and wait for in-flight work.
    ///
    /// Nothing is aborted: queued tasks and pending retries still run.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ShutdownTimeout` if work remains after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), SchedulerError> {
        if !self.inner.shutdown.swap(true, Ordering::SeqCst) {
            info!("scheduler shutting down");
        }
        self.inner.ticker_stop.send_replace(true);
        let result = self.wait_for_completion(timeout).await;
        match &result {
            Ok(()) => info!("scheduler drained"),
            Err(e) => warn!(error = %e, "scheduler did not drain before deadline"),
        }
        result
    }

    /// Whether submissions are rejected.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Pool management
    // ========================================================================

    /// Add a worker of `kind` and dispatch queued work to it.
    pub fn add_worker(&self, kind: AgentKind) -> WorkerId {
        let id = self.inner.state.lock().pool.add_worker(kind);
        self.inner.balancer.register(kind.as_str(), kind.priority_weight());
        self.drain();
        id
    }

    /// Remove an idle worker.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::WorkerNotFound` if `id` is unknown
    /// - `SchedulerError::WorkerBusy` if the worker is not idle
    pub fn remove_worker(&self, id: &str) -> Result<Worker, SchedulerError> {
        self.inner.state.lock().pool.remove_worker(id)
    }

    /// Switch the distribution strategy by name.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::UnknownStrategy` for unrecognized names.
    pub fn set_strategy(&self, name: &str) -> Result<(), SchedulerError> {
        let strategy: DistributionStrategy = name.parse()?;
        self.inner.distributor.set_strategy(strategy);
        info!(strategy = %strategy, "distribution strategy changed");
        self.drain();
        Ok(())
    }

    // ========================================================================
    // Observability
    // ========================================================================

    /// Pool utilization and throughput.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = {
            let state = self.inner.state.lock();
            PoolStats {
                total_workers: state.pool.len(),
                idle_workers: state.pool.count_with(WorkerStatus::Idle),
                busy_workers: state.pool.count_with(WorkerStatus::Busy),
                error_workers: state.pool.count_with(WorkerStatus::Error),
                offline_workers: state.pool.count_with(WorkerStatus::Offline),
                queued_tasks: state.queue.len(),
                running_tasks: state.running.len(),
                retrying_tasks: state.retrying.len(),
                ..PoolStats::default()
            }
        };
        let elapsed = self.inner.started_at.elapsed().as_secs_f64();
        self.inner.counters.fill(&mut stats, elapsed);
        stats
    }

    /// Terminal outcome of a task.
    #[must_use]
    pub fn result(&self, task_id: &str) -> Option<ExecutionResult<R>> {
        self.inner.results.read().get(task_id).cloned()
    }

    /// All terminal outcomes.
    #[must_use]
    pub fn results(&self) -> Vec<ExecutionResult<R>> {
        self.inner.results.read().list()
    }

    /// Current status of a task.
    #[must_use]
    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.inner.state.lock().statuses.get(task_id).copied()
    }

    /// Snapshot of every worker.
    #[must_use]
    pub fn workers(&self) -> Vec<Worker> {
        self.inner.state.lock().pool.workers().to_vec()
    }

    /// Queued tasks in dispatch order.
    #[must_use]
    pub fn queued(&self) -> Vec<Task<P>> {
        self.inner.state.lock().queue.iter().cloned().collect()
    }

    /// Queued, running, and retrying tasks.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.inner.state.lock().outstanding()
    }

    /// Profiler receiving one `task:<type>` metric per attempt.
    #[must_use]
    pub fn profiler(&self) -> Arc<MetricsProfiler> {
        Arc::clone(&self.inner.profiler)
    }

    /// Load balancer tracking running attempts per agent kind.
    #[must_use]
    pub fn load_balancer(&self) -> &LoadBalancer {
        &self.inner.balancer
    }

    /// Running attempts per agent kind.
    #[must_use]
    pub fn load_snapshot(&self) -> BTreeMap<String, AgentLoad> {
        self.inner.balancer.snapshot()
    }

    /// Active distribution strategy.
    #[must_use]
    pub fn strategy(&self) -> DistributionStrategy {
        self.inner.distributor.strategy()
    }

    /// Configuration the scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Spawner that runs attempts, retries, and the health ticker.
    #[must_use]
    pub fn spawner(&self) -> &S {
        &self.inner.spawner
    }
}

fn dependencies_met<P>(task: &Task<P>, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
    task.dependencies
        .iter()
        .all(|dep| statuses.get(dep) == Some(&TaskStatus::Completed))
}

fn failed_dependency<'a, P>(
    task: &'a Task<P>,
    statuses: &HashMap<TaskId, TaskStatus>,
) -> Option<&'a TaskId> {
    task.dependencies.iter().find(|dep| {
        matches!(
            statuses.get(*dep),
            Some(TaskStatus::Failed | TaskStatus::Cancelled)
        )
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
