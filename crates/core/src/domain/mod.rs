// Domain Layer - Queue definitions, roles and sync events

pub mod error;
pub mod event;
pub mod queue;

// Re-exports
pub use error::DomainError;
pub use event::SyncEvent;
pub use queue::{QueueDefinition, QueueId, RepositoryStatus, Role, ServerId};
