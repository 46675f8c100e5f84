// Port Layer - Interfaces for external collaborators

pub mod buffer;
pub mod event_source;
pub mod queue_repository;
pub mod server_identity;
pub mod storage_locator;
pub mod task_executor;
pub mod time_provider;

// Re-exports
pub use buffer::{BufferError, BufferFactory, PersistentBuffer};
pub use event_source::EventSource;
pub use queue_repository::{QueueRepository, ALL_QUEUES};
pub use server_identity::ServerIdentity;
pub use storage_locator::StorageLocator;
pub use task_executor::{ExecutorError, FailureSink, Task, TaskExecutor, WorkerFailure};
pub use time_provider::TimeProvider;
