// Qsync Infrastructure - In-process Adapters
// Implements: EventSource, QueueRepository, ServerIdentity

pub mod event_bus;
pub mod identity;
pub mod queue_repository;

pub use event_bus::InMemoryEventBus;
pub use identity::StaticServerIdentity;
pub use queue_repository::InMemoryQueueRepository;
