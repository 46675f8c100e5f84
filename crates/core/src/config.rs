// Engine configuration

use crate::application::constants::{
    DEFAULT_CORE_WORKERS, DEFAULT_THREAD_NAME_PREFIX, DEFAULT_WORKER_KEEP_ALIVE,
};
use crate::error::{Result, SyncError};
use std::time::Duration;

/// Shared worker pool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Always-warm workers (started eagerly, never retired)
    pub core_workers: usize,
    /// Idle time after which a non-core worker exits
    pub keep_alive: Duration,
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_workers: DEFAULT_CORE_WORKERS,
            keep_alive: DEFAULT_WORKER_KEEP_ALIVE,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

/// QueueSyncEngine settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    pub executor: ExecutorConfig,
    /// Full sweep interval on top of event-driven sync (None = events only)
    pub resync_interval: Option<Duration>,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.executor.keep_alive.is_zero() {
            return Err(SyncError::Config(
                "executor keep_alive must be greater than zero".to_string(),
            ));
        }
        if self.executor.thread_name_prefix.trim().is_empty() {
            return Err(SyncError::Config(
                "executor thread_name_prefix must not be empty".to_string(),
            ));
        }
        if matches!(self.resync_interval, Some(d) if d.is_zero()) {
            return Err(SyncError::Config(
                "resync_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
