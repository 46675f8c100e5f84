// Event Source Port
// Typed publish/subscribe: one subscription per event kind

use crate::domain::{QueueDefinition, RepositoryStatus};
use tokio::sync::broadcast;

/// Delivers repository status and queue change notifications
///
/// Ordering across the two kinds is not guaranteed. Receivers may lag; a
/// lagged receiver has lost events and should trigger a full resync.
pub trait EventSource: Send + Sync {
    fn subscribe_status(&self) -> broadcast::Receiver<RepositoryStatus>;

    fn subscribe_queues(&self) -> broadcast::Receiver<QueueDefinition>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Broadcast-backed event source with publish helpers
    pub struct MockEventSource {
        status_tx: broadcast::Sender<RepositoryStatus>,
        queue_tx: broadcast::Sender<QueueDefinition>,
    }

    impl MockEventSource {
        pub fn new() -> Self {
            Self::with_capacity(64)
        }

        pub fn with_capacity(capacity: usize) -> Self {
            let (status_tx, _) = broadcast::channel(capacity);
            let (queue_tx, _) = broadcast::channel(capacity);
            Self {
                status_tx,
                queue_tx,
            }
        }

        /// Returns the number of subscribers reached
        pub fn publish_status(&self, status: RepositoryStatus) -> usize {
            self.status_tx.send(status).unwrap_or(0)
        }

        pub fn publish_queue(&self, queue: QueueDefinition) -> usize {
            self.queue_tx.send(queue).unwrap_or(0)
        }
    }

    impl Default for MockEventSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EventSource for MockEventSource {
        fn subscribe_status(&self) -> broadcast::Receiver<RepositoryStatus> {
            self.status_tx.subscribe()
        }

        fn subscribe_queues(&self) -> broadcast::Receiver<QueueDefinition> {
            self.queue_tx.subscribe()
        }
    }
}
