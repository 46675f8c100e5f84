// Task Executor Port
// Shared execution substrate for buffer background work

use std::sync::Arc;
use thiserror::Error;

/// Unit of background work submitted by a buffer
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Executor is shut down")]
    ShutDown,

    #[error("Worker spawn failed: {0}")]
    SpawnFailed(String),
}

/// An uncaught failure (panic) inside a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    /// Name of the worker thread that ran the task
    pub worker: String,
    pub message: String,
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker {} failed: {}", self.worker, self.message)
    }
}

/// Callback receiving worker failures
///
/// Injected at executor construction so the executor does not depend on the
/// lifetime of whatever object reports the failure.
pub type FailureSink = Arc<dyn Fn(WorkerFailure) + Send + Sync>;

/// Task Executor trait
///
/// Implementations:
/// - WorkerPool: direct hand-off thread pool (application::executor)
/// - InlineTaskExecutor: runs on the caller's thread (tests)
pub trait TaskExecutor: Send + Sync {
    /// Hand a task to a worker
    ///
    /// # Errors
    /// - ExecutorError::ShutDown once the executor has been shut down
    /// - ExecutorError::SpawnFailed if no worker could accept the task
    fn execute(&self, task: Task) -> Result<(), ExecutorError>;

    /// Human readable name (used in buffer diagnostics)
    fn name(&self) -> &str;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Runs every task synchronously on the submitting thread
    pub struct InlineTaskExecutor {
        executed: AtomicUsize,
        shut_down: AtomicBool,
    }

    impl InlineTaskExecutor {
        pub fn new() -> Self {
            Self {
                executed: AtomicUsize::new(0),
                shut_down: AtomicBool::new(false),
            }
        }

        pub fn executed(&self) -> usize {
            self.executed.load(Ordering::SeqCst)
        }

        pub fn shutdown(&self) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    impl Default for InlineTaskExecutor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TaskExecutor for InlineTaskExecutor {
        fn execute(&self, task: Task) -> Result<(), ExecutorError> {
            if self.shut_down.load(Ordering::SeqCst) {
                return Err(ExecutorError::ShutDown);
            }
            task();
            self.executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "inline"
        }
    }
}
