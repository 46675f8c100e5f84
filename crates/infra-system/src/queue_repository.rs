// In-memory queue repository
// Single-node stand-in for the cluster registry; publishes every change

use crate::event_bus::InMemoryEventBus;
use async_trait::async_trait;
use qsync_core::domain::{QueueDefinition, QueueId, RepositoryStatus, SyncEvent};
use qsync_core::error::{Result, SyncError};
use qsync_core::port::QueueRepository;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Queue definitions ordered by id
pub struct InMemoryQueueRepository {
    queues: RwLock<BTreeMap<QueueId, QueueDefinition>>,
    up: AtomicBool,
    bus: Option<Arc<InMemoryEventBus>>,
}

impl InMemoryQueueRepository {
    /// Starts down and empty; changes are published on `bus` if given
    pub fn new(bus: Option<Arc<InMemoryEventBus>>) -> Self {
        Self {
            queues: RwLock::new(BTreeMap::new()),
            up: AtomicBool::new(false),
            bus,
        }
    }

    /// Store `queue`, bumping its version past the stored one, and publish it
    ///
    /// # Errors
    /// - SyncError::Domain if the definition is invalid
    pub fn upsert(&self, mut queue: QueueDefinition) -> Result<QueueDefinition> {
        queue.validate()?;
        {
            let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = queues.get(&queue.id) {
                queue.version = queue.version.max(previous.version + 1);
            }
            queues.insert(queue.id.clone(), queue.clone());
        }
        debug!(queue_id = %queue.id, version = queue.version, "Queue definition stored");
        self.publish(SyncEvent::QueueChanged(queue.clone()));
        Ok(queue)
    }

    pub fn get(&self, queue_id: &str) -> Option<QueueDefinition> {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.queues.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flip the status; an actual change is published
    pub fn set_up(&self, up: bool) {
        if self.up.swap(up, Ordering::SeqCst) != up {
            info!(up, "Queue repository status changed");
            self.publish(SyncEvent::RepositoryStatusChanged(RepositoryStatus { up }));
        }
    }

    /// Load a JSON array of queue definitions
    ///
    /// # Errors
    /// - SyncError::Io if the file cannot be read
    /// - SyncError::Serialization if it is not a list of definitions
    /// - SyncError::Domain if a definition is invalid (earlier ones stay loaded)
    pub async fn load_json(&self, path: &Path) -> Result<usize> {
        let bytes = tokio::fs::read(path).await?;
        let queues: Vec<QueueDefinition> = serde_json::from_slice(&bytes)?;
        let count = queues.len();
        for queue in queues {
            self.upsert(queue)?;
        }
        info!(path = %path.display(), count, "Loaded queue definitions");
        Ok(count)
    }

    fn publish(&self, event: SyncEvent) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn status(&self) -> Result<RepositoryStatus> {
        Ok(RepositoryStatus {
            up: self.up.load(Ordering::SeqCst),
        })
    }

    async fn find_queues(&self, offset: usize, limit: Option<usize>) -> Result<Vec<QueueDefinition>> {
        if !self.up.load(Ordering::SeqCst) {
            return Err(SyncError::Repository("queue repository is down".to_string()));
        }
        let queues = self.queues.read().unwrap_or_else(PoisonError::into_inner);
        Ok(queues
            .values()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsync_core::port::EventSource;

    #[test]
    fn test_upsert_bumps_version() {
        let repo = InMemoryQueueRepository::new(None);
        assert_eq!(repo.upsert(QueueDefinition::new("q1", "s1")).unwrap().version, 0);
        assert_eq!(repo.upsert(QueueDefinition::new("q1", "s2")).unwrap().version, 1);
        assert_eq!(
            repo.upsert(QueueDefinition::new("q1", "s2").with_version(10))
                .unwrap()
                .version,
            10
        );
        assert_eq!(repo.get("q1").unwrap().master_server_id, "s2");
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_upsert_rejects_invalid_definition() {
        let repo = InMemoryQueueRepository::new(None);
        assert!(matches!(
            repo.upsert(QueueDefinition::new("", "s1")),
            Err(SyncError::Domain(_))
        ));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_upsert_accepts_unassigned_master() {
        let repo = InMemoryQueueRepository::new(None);
        repo.upsert(QueueDefinition::new("q1", "s1")).unwrap();
        let stored = repo
            .upsert(QueueDefinition::new("q1", "").with_slaves(["s2"]))
            .unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(repo.get("q1").unwrap().master_server_id, "");
    }

    #[tokio::test]
    async fn test_find_queues_pages_in_id_order() {
        let repo = InMemoryQueueRepository::new(None);
        for id in ["c", "a", "b"] {
            repo.upsert(QueueDefinition::new(id, "s1")).unwrap();
        }
        repo.set_up(true);

        let all: Vec<_> = repo.find_queues(0, None).await.unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(all, vec!["a", "b", "c"]);
        let page = repo.find_queues(1, Some(1)).await.unwrap();
        assert_eq!(page[0].id, "b");
    }

    #[tokio::test]
    async fn test_down_repository_cannot_be_listed() {
        let repo = InMemoryQueueRepository::new(None);
        assert!(!repo.status().await.unwrap().is_up());
        assert!(repo.find_queues(0, None).await.is_err());
    }

    #[tokio::test]
    async fn test_changes_are_published() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut status_rx = bus.subscribe_status();
        let mut queue_rx = bus.subscribe_queues();
        let repo = InMemoryQueueRepository::new(Some(bus.clone()));

        repo.set_up(true);
        repo.set_up(true);
        repo.upsert(QueueDefinition::new("q1", "s1")).unwrap();

        assert_eq!(status_rx.recv().await.unwrap(), RepositoryStatus::UP);
        assert!(status_rx.try_recv().is_err());
        assert_eq!(queue_rx.recv().await.unwrap().id, "q1");
    }

    #[tokio::test]
    async fn test_load_json_seed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queues.json");
        tokio::fs::write(
            &path,
            r#"[
                {"id":"orders","master_server_id":"s1","slave_server_ids":["s2"],"max_payload_size":1024,"max_size":1048576},
                {"id":"audit","master_server_id":"s2","max_payload_size":512,"max_size":4096}
            ]"#,
        )
        .await
        .unwrap();

        let repo = InMemoryQueueRepository::new(None);
        assert_eq!(repo.load_json(&path).await.unwrap(), 2);
        assert!(repo.get("orders").unwrap().is_slave("s2"));

        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(
            repo.load_json(&path).await,
            Err(SyncError::Serialization(_))
        ));
    }
}
