// Shared worker pool for buffer background work
//
// Direct hand-off: a task is accepted only if an idle worker takes it right
// away or a fresh worker is spawned for it. There is no work queue.

mod panic_guard;

pub use panic_guard::{execute_guarded, PanicGuardResult};

use crate::config::ExecutorConfig;
use crate::port::{ExecutorError, FailureSink, Task, TaskExecutor, WorkerFailure};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Failure sink that logs and nothing else
pub fn log_worker_failure(failure: WorkerFailure) {
    error!(
        worker = %failure.worker,
        cause = %failure.message,
        "Uncaught failure in buffer worker"
    );
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorStats {
    pub live_workers: usize,
    pub idle_workers: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
}

struct PoolShared {
    handoff_rx: Receiver<Task>,
    failure_sink: FailureSink,
    core_workers: usize,
    keep_alive: Duration,
    live: AtomicUsize,
    idle: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Elastic thread pool shared by every open buffer
pub struct WorkerPool {
    name: String,
    shared: Arc<PoolShared>,
    /// None once shut down; dropping the sender releases idle workers
    handoff_tx: Mutex<Option<Sender<Task>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    next_worker: AtomicUsize,
    shut_down: AtomicBool,
}

impl WorkerPool {
    /// Create the pool and start its core workers
    ///
    /// # Errors
    /// - ExecutorError::SpawnFailed if a core worker thread cannot be started
    pub fn new(config: ExecutorConfig, failure_sink: FailureSink) -> Result<Self, ExecutorError> {
        let (handoff_tx, handoff_rx) = crossbeam_channel::bounded(0);
        let pool = Self {
            name: config.thread_name_prefix,
            shared: Arc::new(PoolShared {
                handoff_rx,
                failure_sink,
                core_workers: config.core_workers,
                keep_alive: config.keep_alive,
                live: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            handoff_tx: Mutex::new(Some(handoff_tx)),
            threads: Mutex::new(Vec::new()),
            next_worker: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        };

        for _ in 0..pool.shared.core_workers {
            pool.spawn_worker(None)?;
        }
        info!(
            pool = %pool.name,
            core_workers = pool.shared.core_workers,
            keep_alive_ms = pool.shared.keep_alive.as_millis() as u64,
            "Worker pool started"
        );
        Ok(pool)
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            live_workers: self.shared.live.load(Ordering::SeqCst),
            idle_workers: self.shared.idle.load(Ordering::SeqCst),
            completed_tasks: self.shared.completed.load(Ordering::SeqCst),
            failed_tasks: self.shared.failed.load(Ordering::SeqCst),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Reject new tasks, let running ones finish, join every worker
    ///
    /// Blocks the calling thread; from async code run it on a blocking thread.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.handoff_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let threads = std::mem::take(&mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner));
        let current = std::thread::current().id();
        for handle in threads {
            // A task shutting down its own pool cannot join itself
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(pool = %self.name, "Worker thread exited abnormally");
            }
        }
        info!(pool = %self.name, "Worker pool shut down");
    }

    fn spawn_worker(&self, first_task: Option<Task>) -> Result<(), ExecutorError> {
        // Held across the spawn so shutdown either sees this thread or we see shutdown
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_shut_down() {
            return Err(ExecutorError::ShutDown);
        }

        let n = self.next_worker.fetch_add(1, Ordering::SeqCst);
        let worker_name = format!("{}-{}", self.name, n);
        let shared = Arc::clone(&self.shared);

        shared.live.fetch_add(1, Ordering::SeqCst);
        let spawned = std::thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || run_worker(shared, worker_name, first_task));

        match spawned {
            Ok(handle) => {
                threads.retain(|h| !h.is_finished());
                threads.push(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.live.fetch_sub(1, Ordering::SeqCst);
                error!(pool = %self.name, error = %e, "Failed to spawn worker");
                Err(ExecutorError::SpawnFailed(e.to_string()))
            }
        }
    }
}

impl TaskExecutor for WorkerPool {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        if self.is_shut_down() {
            return Err(ExecutorError::ShutDown);
        }
        let tx = match self
            .handoff_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.clone(),
            None => return Err(ExecutorError::ShutDown),
        };

        match tx.try_send(task) {
            Ok(()) => Ok(()),
            // No idle worker waiting: grow the pool
            Err(TrySendError::Full(task)) => self.spawn_worker(Some(task)),
            Err(TrySendError::Disconnected(_)) => Err(ExecutorError::ShutDown),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Idle workers exit once the sender is gone; no join here
        self.shut_down.store(true, Ordering::SeqCst);
        self.handoff_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

fn run_worker(shared: Arc<PoolShared>, worker_name: String, first_task: Option<Task>) {
    debug!(worker = %worker_name, "Worker started");
    if let Some(task) = first_task {
        run_task(&shared, &worker_name, task);
    }

    loop {
        shared.idle.fetch_add(1, Ordering::SeqCst);
        let next = shared.handoff_rx.recv_timeout(shared.keep_alive);
        shared.idle.fetch_sub(1, Ordering::SeqCst);

        match next {
            Ok(task) => run_task(&shared, &worker_name, task),
            Err(RecvTimeoutError::Timeout) => {
                if try_retire(&shared) {
                    debug!(worker = %worker_name, "Idle worker retired");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shared.live.fetch_sub(1, Ordering::SeqCst);
    debug!(worker = %worker_name, "Worker stopped");
}

/// Claim one slot above the core size, if any
fn try_retire(shared: &PoolShared) -> bool {
    shared
        .live
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
            (live > shared.core_workers).then(|| live - 1)
        })
        .is_ok()
}

fn run_task(shared: &PoolShared, worker_name: &str, task: Task) {
    match execute_guarded(AssertUnwindSafe(task)) {
        PanicGuardResult::Success(()) => {
            shared.completed.fetch_add(1, Ordering::SeqCst);
        }
        PanicGuardResult::Panicked(message) => {
            shared.failed.fetch_add(1, Ordering::SeqCst);
            let failure = WorkerFailure {
                worker: worker_name.to_string(),
                message,
            };
            // A panicking sink must not kill the worker either
            if let PanicGuardResult::Panicked(msg) =
                execute_guarded(AssertUnwindSafe(|| (shared.failure_sink)(failure)))
            {
                error!(worker = %worker_name, cause = %msg, "Failure sink panicked");
            }
        }
    }
}
