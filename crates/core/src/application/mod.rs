// Application Layer - Reconciliation engine and shared executor

pub mod constants;
pub mod engine;
pub mod executor;
mod shutdown;

// Re-exports
pub use engine::{
    BufferHandle, EngineDeps, QueueSyncEngine, ReconcileOutcome, RejectedProperty,
    ShutdownReport, SweepReport,
};
pub use executor::{log_worker_failure, ExecutorStats, WorkerPool};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
