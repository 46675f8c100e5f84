// Engine constants (ADR: No magic values)
use std::time::Duration;

/// Workers kept alive even when idle
pub const DEFAULT_CORE_WORKERS: usize = 2;

/// Idle time after which a non-core worker exits (60s)
pub const DEFAULT_WORKER_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Worker thread names are `<prefix>-<n>`
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "queue-sync";

/// Capacity of the in-process event channels
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on waiting for listener tasks during shutdown (5s)
pub const LISTENER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
