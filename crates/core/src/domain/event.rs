// Sync Events delivered by the EventSource port

use super::queue::{QueueDefinition, RepositoryStatus};

/// Notification that may require reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The queue repository went up or down
    RepositoryStatusChanged(RepositoryStatus),
    /// A queue definition was created or updated
    QueueChanged(QueueDefinition),
}

impl SyncEvent {
    /// Queue id this event concerns, if any
    pub fn queue_id(&self) -> Option<&str> {
        match self {
            SyncEvent::RepositoryStatusChanged(_) => None,
            SyncEvent::QueueChanged(def) => Some(&def.id),
        }
    }
}
