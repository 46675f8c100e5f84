// In-process event bus backed by tokio broadcast channels

use qsync_core::application::constants::DEFAULT_EVENT_CHANNEL_CAPACITY;
use qsync_core::domain::{QueueDefinition, RepositoryStatus, SyncEvent};
use qsync_core::port::EventSource;
use tokio::sync::broadcast;
use tracing::trace;

/// One broadcast channel per event kind
pub struct InMemoryEventBus {
    status_tx: broadcast::Sender<RepositoryStatus>,
    queue_tx: broadcast::Sender<QueueDefinition>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    /// `capacity` events are buffered per subscriber before it lags
    pub fn with_capacity(capacity: usize) -> Self {
        let (status_tx, _) = broadcast::channel(capacity);
        let (queue_tx, _) = broadcast::channel(capacity);
        Self {
            status_tx,
            queue_tx,
        }
    }

    /// Deliver an event; returns the number of subscribers reached
    ///
    /// Having no subscriber is not an error.
    pub fn publish(&self, event: SyncEvent) -> usize {
        trace!(event = ?event, "Publishing sync event");
        match event {
            SyncEvent::RepositoryStatusChanged(status) => self.status_tx.send(status).unwrap_or(0),
            SyncEvent::QueueChanged(queue) => self.queue_tx.send(queue).unwrap_or(0),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.status_tx.receiver_count() + self.queue_tx.receiver_count()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for InMemoryEventBus {
    fn subscribe_status(&self) -> broadcast::Receiver<RepositoryStatus> {
        self.status_tx.subscribe()
    }

    fn subscribe_queues(&self) -> broadcast::Receiver<QueueDefinition> {
        self.queue_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_route_by_kind() {
        let bus = InMemoryEventBus::new();
        let mut status_rx = bus.subscribe_status();
        let mut queue_rx = bus.subscribe_queues();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(SyncEvent::RepositoryStatusChanged(RepositoryStatus::UP)), 1);
        assert_eq!(
            bus.publish(SyncEvent::QueueChanged(QueueDefinition::new("q1", "s1"))),
            1
        );

        assert_eq!(status_rx.recv().await.unwrap(), RepositoryStatus::UP);
        assert_eq!(queue_rx.recv().await.unwrap().id, "q1");
        assert!(status_rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(SyncEvent::RepositoryStatusChanged(RepositoryStatus::DOWN)), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut rx = bus.subscribe_queues();
        for i in 0..5 {
            bus.publish(SyncEvent::QueueChanged(QueueDefinition::new(format!("q{}", i), "s1")));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
    }
}
