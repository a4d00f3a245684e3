//! In-process task queue with a bounded worker pool, exponential retry,
//! dead-lettering, and bounded task history.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::queue::task::{EnqueueOptions, ImportTask, QueueStats, TaskRecord};
use crate::queue::{QueueError, TaskHandler};

/// Tuning knobs for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Worker pool size.
    pub concurrency: usize,
    /// Total execution attempts per task before it is dead.
    pub max_attempts: u32,
    /// Base delay for exponential retry backoff.
    pub retry_base_delay: Duration,
    /// Retained completed-task records.
    pub keep_completed: usize,
    /// Retained failed-task records.
    pub keep_failed: usize,
    /// Active tasks running longer than this are reported as stalled.
    pub stall_threshold: Duration,
    pub stall_check_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(5),
            keep_completed: 100,
            keep_failed: 50,
            stall_threshold: Duration::from_secs(30),
            stall_check_interval: Duration::from_secs(30),
        }
    }
}

struct QueuedTask {
    id: u64,
    task: ImportTask,
    priority: u8,
    /// Executions already made; zero for a fresh task.
    attempts_made: u32,
    dedupe_id: Option<String>,
}

struct ReadyTask(QueuedTask);

impl PartialEq for ReadyTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for ReadyTask {}

impl PartialOrd for ReadyTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Max-heap: highest priority first, then oldest id.
impl Ord for ReadyTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then(other.0.id.cmp(&self.0.id))
    }
}

struct DelayedTask {
    ready_at: Instant,
    queued: QueuedTask,
}

struct ActiveTask {
    started_at: Instant,
}

#[derive(Default)]
struct QueueState {
    ready: BinaryHeap<ReadyTask>,
    delayed: Vec<DelayedTask>,
    dedupe: HashSet<String>,
    active: HashMap<u64, ActiveTask>,
    completed: VecDeque<TaskRecord>,
    failed: VecDeque<TaskRecord>,
}

struct Inner {
    config: DispatcherConfig,
    state: Mutex<QueueState>,
    notify: Notify,
    next_task_id: AtomicU64,
}

impl Inner {
    /// Promotes due delayed tasks, then pops the best ready one into the
    /// active set.
    fn take_ready(&self) -> Option<QueuedTask> {
        let mut state = self.state.lock().expect("queue state poisoned");
        let now = Instant::now();
        let mut still_delayed = Vec::new();
        for delayed in std::mem::take(&mut state.delayed) {
            if delayed.ready_at <= now {
                state.ready.push(ReadyTask(delayed.queued));
            } else {
                still_delayed.push(delayed);
            }
        }
        state.delayed = still_delayed;

        let next = state.ready.pop().map(|ready| ready.0)?;
        state.active.insert(next.id, ActiveTask { started_at: now });
        Some(next)
    }

    /// Time until the earliest delayed task becomes ready.
    fn next_wakeup(&self) -> Option<Duration> {
        let state = self.state.lock().expect("queue state poisoned");
        let now = Instant::now();
        state
            .delayed
            .iter()
            .map(|delayed| delayed.ready_at.saturating_duration_since(now))
            .min()
    }
}

fn push_bounded(records: &mut VecDeque<TaskRecord>, record: TaskRecord, keep: usize) {
    records.push_back(record);
    while records.len() > keep {
        records.pop_front();
    }
}

fn backoff_delay(base: Duration, attempts_made: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempts_made.saturating_sub(1)))
}

/// Task queue plus bounded-concurrency worker pool.
///
/// Tasks are dispatched best-effort FIFO modulated by priority. Execution is
/// at-least-once: a failed attempt is re-queued with exponential backoff
/// until the attempt cap, then the task is dead and retained in the failed
/// history. There is no ordering guarantee across tasks targeting
/// overlapping feeds; the store's atomic upsert is what makes that safe.
pub struct WorkDispatcher {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                next_task_id: AtomicU64::new(1),
            }),
            cancel: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the worker pool and the stall monitor.
    pub fn start(&self, handler: Arc<dyn TaskHandler>) {
        let mut workers = self.workers.lock().expect("worker handles poisoned");
        for worker_id in 0..self.inner.config.concurrency.max(1) {
            let inner = Arc::clone(&self.inner);
            let handler = Arc::clone(&handler);
            let cancel = self.cancel.clone();
            workers.push(tokio::spawn(worker_loop(inner, handler, cancel, worker_id)));
        }
        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        workers.push(tokio::spawn(stall_monitor(inner, cancel)));
    }

    /// Adds a task to the queue. Fails on a duplicate dedupe id or after
    /// shutdown began.
    pub fn enqueue(&self, task: ImportTask, options: EnqueueOptions) -> Result<u64, QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::ShuttingDown);
        }

        let mut state = self.inner.state.lock().expect("queue state poisoned");
        if let Some(dedupe_id) = &options.dedupe_id {
            if !state.dedupe.insert(dedupe_id.clone()) {
                return Err(QueueError::DuplicateTask(dedupe_id.clone()));
            }
        }

        let id = self.inner.next_task_id.fetch_add(1, AtomicOrdering::Relaxed);
        let queued = QueuedTask {
            id,
            task,
            priority: options.priority,
            attempts_made: 0,
            dedupe_id: options.dedupe_id,
        };

        match options.delay {
            Some(delay) if !delay.is_zero() => state.delayed.push(DelayedTask {
                ready_at: Instant::now() + delay,
                queued,
            }),
            _ => state.ready.push(ReadyTask(queued)),
        }
        drop(state);

        self.inner.notify.notify_one();
        tracing::debug!(task_id = id, "task enqueued");
        Ok(id)
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().expect("queue state poisoned");
        QueueStats {
            waiting: state.ready.len(),
            delayed: state.delayed.len(),
            active: state.active.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
        }
    }

    pub fn completed_tasks(&self) -> Vec<TaskRecord> {
        let state = self.inner.state.lock().expect("queue state poisoned");
        state.completed.iter().cloned().collect()
    }

    pub fn failed_tasks(&self) -> Vec<TaskRecord> {
        let state = self.inner.state.lock().expect("queue state poisoned");
        state.failed.iter().cloned().collect()
    }

    /// Drops all pending and delayed tasks plus retained history. Active
    /// tasks keep running to completion.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock().expect("queue state poisoned");
        let dropped = state.ready.len() + state.delayed.len();
        state.ready.clear();
        state.delayed.clear();
        state.dedupe.clear();
        state.completed.clear();
        state.failed.clear();
        tracing::info!(dropped, "queue cleared");
    }

    /// Cancels the pool and waits for in-flight tasks to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.inner.notify.notify_waiters();
        let workers = {
            let mut workers = self.workers.lock().expect("worker handles poisoned");
            std::mem::take(&mut *workers)
        };
        for worker in workers {
            let _ = worker.await;
        }
        tracing::info!("dispatcher stopped");
    }
}

async fn worker_loop(
    inner: Arc<Inner>,
    handler: Arc<dyn TaskHandler>,
    cancel: CancellationToken,
    worker_id: usize,
) {
    tracing::debug!(worker_id, "worker started");
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match inner.take_ready() {
            Some(queued) => run_task(&inner, handler.as_ref(), queued).await,
            None => {
                let idle = inner
                    .next_wakeup()
                    .unwrap_or(Duration::from_millis(500));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = inner.notify.notified() => {}
                    _ = tokio::time::sleep(idle) => {}
                }
            }
        }
    }
    tracing::debug!(worker_id, "worker stopped");
}

async fn run_task(inner: &Arc<Inner>, handler: &dyn TaskHandler, queued: QueuedTask) {
    let attempt = queued.attempts_made + 1;
    tracing::info!(
        task_id = queued.id,
        run_id = %queued.task.run_id,
        feed = queued.task.feed_url.as_deref().unwrap_or("all-feeds"),
        attempt,
        "task started"
    );

    let outcome = handler.handle(&queued.task).await;

    let mut state = inner.state.lock().expect("queue state poisoned");
    state.active.remove(&queued.id);
    match outcome {
        Ok(()) => {
            if let Some(dedupe_id) = &queued.dedupe_id {
                state.dedupe.remove(dedupe_id);
            }
            let keep = inner.config.keep_completed;
            push_bounded(
                &mut state.completed,
                TaskRecord {
                    task_id: queued.id,
                    task: queued.task,
                    attempts_made: attempt,
                    finished_at: Utc::now(),
                    error: None,
                },
                keep,
            );
            tracing::info!(task_id = queued.id, "task completed");
        }
        Err(error) if attempt < inner.config.max_attempts => {
            let delay = backoff_delay(inner.config.retry_base_delay, attempt);
            tracing::warn!(
                task_id = queued.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                %error,
                "task failed, retrying with backoff"
            );
            state.delayed.push(DelayedTask {
                ready_at: Instant::now() + delay,
                queued: QueuedTask {
                    attempts_made: attempt,
                    ..queued
                },
            });
        }
        Err(error) => {
            if let Some(dedupe_id) = &queued.dedupe_id {
                state.dedupe.remove(dedupe_id);
            }
            let keep = inner.config.keep_failed;
            push_bounded(
                &mut state.failed,
                TaskRecord {
                    task_id: queued.id,
                    task: queued.task,
                    attempts_made: attempt,
                    finished_at: Utc::now(),
                    error: Some(error.to_string()),
                },
                keep,
            );
            tracing::error!(
                task_id = queued.id,
                attempts = attempt,
                %error,
                "task dead after exhausting retries"
            );
        }
    }
    drop(state);
    inner.notify.notify_one();
}

/// Queue-level liveness detector, separate from the stalled-run reconciler:
/// it only reports, it never mutates run records.
async fn stall_monitor(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(inner.config.stall_check_interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let now = Instant::now();
        let state = inner.state.lock().expect("queue state poisoned");
        for (task_id, active) in &state.active {
            let elapsed = now.duration_since(active.started_at);
            if elapsed > inner.config.stall_threshold {
                tracing::warn!(
                    task_id = *task_id,
                    elapsed_secs = elapsed.as_secs(),
                    "task stalled"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    use crate::error::{AppError, AppResult};
    use crate::queue::{MANUAL_PRIORITY, SCHEDULED_PRIORITY};

    fn task(feed: Option<&str>) -> ImportTask {
        ImportTask {
            run_id: Uuid::new_v4(),
            feed_url: feed.map(str::to_string),
        }
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            concurrency: 2,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            keep_completed: 100,
            keep_failed: 50,
            stall_threshold: Duration::from_secs(30),
            stall_check_interval: Duration::from_secs(30),
        }
    }

    /// Records handled feeds in order; fails while `failures_left` is positive.
    struct RecordingHandler {
        handled: Mutex<Vec<Option<String>>>,
        failures_left: AtomicUsize,
    }

    impl RecordingHandler {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                handled: Mutex::new(Vec::new()),
                failures_left: AtomicUsize::new(failures),
            })
        }

        fn handled(&self) -> Vec<Option<String>> {
            self.handled.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskHandler for RecordingHandler {
        async fn handle(&self, task: &ImportTask) -> AppResult<()> {
            self.handled.lock().unwrap().push(task.feed_url.clone());
            let remaining = self
                .failures_left
                .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |left| {
                    left.checked_sub(1)
                });
            if remaining.is_ok() {
                return Err(AppError::Internal {
                    source: anyhow::anyhow!("induced failure"),
                });
            }
            Ok(())
        }
    }

    async fn wait_until(dispatcher: &WorkDispatcher, check: impl Fn(QueueStats) -> bool) {
        for _ in 0..200 {
            if check(dispatcher.stats()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("queue never reached expected state: {:?}", dispatcher.stats());
    }

    #[tokio::test(start_paused = true)]
    async fn completes_a_task_and_records_history() {
        let dispatcher = WorkDispatcher::new(config());
        let handler = RecordingHandler::new(0);
        dispatcher.start(handler.clone());

        dispatcher
            .enqueue(task(Some("https://feeds.test/a")), EnqueueOptions::default())
            .unwrap();

        wait_until(&dispatcher, |stats| stats.completed == 1).await;
        let records = dispatcher.completed_tasks();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attempts_made, 1);
        assert!(records[0].error.is_none());
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retries_up_to_cap_then_dead_letters() {
        let dispatcher = WorkDispatcher::new(config());
        // Fails forever.
        let handler = RecordingHandler::new(usize::MAX);
        dispatcher.start(handler.clone());

        dispatcher.enqueue(task(None), EnqueueOptions::default()).unwrap();

        wait_until(&dispatcher, |stats| stats.failed == 1).await;
        // Exactly max_attempts executions, no more.
        assert_eq!(handler.handled().len(), 3);
        let dead = dispatcher.failed_tasks();
        assert_eq!(dead[0].attempts_made, 3);
        assert!(dead[0].error.is_some());

        // Give the queue a chance to (incorrectly) retry again.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handler.handled().len(), 3);
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_within_attempts() {
        let dispatcher = WorkDispatcher::new(config());
        let handler = RecordingHandler::new(2);
        dispatcher.start(handler.clone());

        dispatcher.enqueue(task(None), EnqueueOptions::default()).unwrap();

        wait_until(&dispatcher, |stats| stats.completed == 1).await;
        assert_eq!(handler.handled().len(), 3);
        assert_eq!(dispatcher.completed_tasks()[0].attempts_made, 3);
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn priority_orders_ready_tasks() {
        let mut low_concurrency = config();
        low_concurrency.concurrency = 1;
        let dispatcher = WorkDispatcher::new(low_concurrency);
        let handler = RecordingHandler::new(0);

        // Enqueue before starting workers so ordering is observable.
        dispatcher
            .enqueue(
                task(Some("manual")),
                EnqueueOptions {
                    priority: MANUAL_PRIORITY,
                    ..EnqueueOptions::default()
                },
            )
            .unwrap();
        dispatcher
            .enqueue(
                task(Some("scheduled")),
                EnqueueOptions {
                    priority: SCHEDULED_PRIORITY,
                    ..EnqueueOptions::default()
                },
            )
            .unwrap();

        dispatcher.start(handler.clone());
        wait_until(&dispatcher, |stats| stats.completed == 2).await;
        assert_eq!(
            handler.handled(),
            vec![Some("scheduled".to_string()), Some("manual".to_string())]
        );
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn dedupe_id_rejects_second_enqueue() {
        let dispatcher = WorkDispatcher::new(config());
        let options = || EnqueueOptions {
            dedupe_id: Some("scheduled-1700000000".to_string()),
            ..EnqueueOptions::default()
        };

        dispatcher.enqueue(task(None), options()).unwrap();
        let error = dispatcher.enqueue(task(None), options()).unwrap_err();
        assert!(matches!(error, QueueError::DuplicateTask(_)));

        // A different id is fine.
        dispatcher
            .enqueue(
                task(None),
                EnqueueOptions {
                    dedupe_id: Some("scheduled-1700003600".to_string()),
                    ..EnqueueOptions::default()
                },
            )
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dedupe_id_is_released_after_completion() {
        let dispatcher = WorkDispatcher::new(config());
        let handler = RecordingHandler::new(0);
        dispatcher.start(handler.clone());

        let options = || EnqueueOptions {
            dedupe_id: Some("tick-1".to_string()),
            ..EnqueueOptions::default()
        };
        dispatcher.enqueue(task(None), options()).unwrap();
        wait_until(&dispatcher, |stats| stats.completed == 1).await;

        dispatcher.enqueue(task(None), options()).unwrap();
        wait_until(&dispatcher, |stats| stats.completed == 2).await;
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn history_is_bounded() {
        let mut small = config();
        small.keep_completed = 3;
        let dispatcher = WorkDispatcher::new(small);
        let handler = RecordingHandler::new(0);
        dispatcher.start(handler.clone());

        for _ in 0..5 {
            dispatcher.enqueue(task(None), EnqueueOptions::default()).unwrap();
        }
        wait_until(&dispatcher, |stats| stats.completed == 3 && stats.waiting == 0 && stats.active == 0).await;
        assert_eq!(handler.handled().len(), 5);
        assert_eq!(dispatcher.completed_tasks().len(), 3);
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_task_waits_for_its_delay() {
        let dispatcher = WorkDispatcher::new(config());
        let handler = RecordingHandler::new(0);
        dispatcher.start(handler.clone());

        dispatcher
            .enqueue(
                task(None),
                EnqueueOptions {
                    delay: Some(Duration::from_secs(60)),
                    ..EnqueueOptions::default()
                },
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(dispatcher.stats().completed, 0);

        // Jump past the delay; the worker should then pick the task up.
        tokio::time::sleep(Duration::from_secs(61)).await;
        wait_until(&dispatcher, |stats| stats.completed == 1).await;
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn clear_drops_pending_and_history() {
        let dispatcher = WorkDispatcher::new(config());
        dispatcher.enqueue(task(None), EnqueueOptions::default()).unwrap();
        dispatcher
            .enqueue(
                task(None),
                EnqueueOptions {
                    delay: Some(Duration::from_secs(60)),
                    ..EnqueueOptions::default()
                },
            )
            .unwrap();
        assert_eq!(dispatcher.stats().waiting, 1);
        assert_eq!(dispatcher.stats().delayed, 1);

        dispatcher.clear();
        let stats = dispatcher.stats();
        assert_eq!(stats.waiting + stats.delayed + stats.completed + stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_after_shutdown_is_rejected() {
        let dispatcher = WorkDispatcher::new(config());
        let handler = RecordingHandler::new(0);
        dispatcher.start(handler);
        dispatcher.shutdown().await;

        let error = dispatcher.enqueue(task(None), EnqueueOptions::default()).unwrap_err();
        assert!(matches!(error, QueueError::ShuttingDown));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(20));
    }
}
