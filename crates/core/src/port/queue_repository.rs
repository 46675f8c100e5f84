// Queue Repository Port (Interface)
// The authoritative, cluster-wide source of queue definitions

use crate::domain::{QueueDefinition, RepositoryStatus};
use crate::error::Result;
use async_trait::async_trait;

/// `limit` value for [`QueueRepository::find_queues`] returning every queue
pub const ALL_QUEUES: Option<usize> = None;

/// Repository interface for queue definitions
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Current up/down status
    async fn status(&self) -> Result<RepositoryStatus>;

    /// List definitions starting at `offset`; `limit` of `None` means all
    async fn find_queues(&self, offset: usize, limit: Option<usize>) -> Result<Vec<QueueDefinition>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::SyncError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory repository ordered by queue id
    pub struct MockQueueRepository {
        queues: Mutex<BTreeMap<String, QueueDefinition>>,
        up: AtomicBool,
        fail_listing: AtomicBool,
        list_calls: AtomicUsize,
    }

    impl MockQueueRepository {
        pub fn new(up: bool) -> Self {
            Self {
                queues: Mutex::new(BTreeMap::new()),
                up: AtomicBool::new(up),
                fail_listing: AtomicBool::new(false),
                list_calls: AtomicUsize::new(0),
            }
        }

        pub fn with_queues(up: bool, queues: impl IntoIterator<Item = QueueDefinition>) -> Self {
            let repo = Self::new(up);
            for q in queues {
                repo.put(q);
            }
            repo
        }

        pub fn put(&self, queue: QueueDefinition) {
            self.queues.lock().unwrap().insert(queue.id.clone(), queue);
        }

        pub fn remove(&self, queue_id: &str) -> Option<QueueDefinition> {
            self.queues.lock().unwrap().remove(queue_id)
        }

        pub fn set_up(&self, up: bool) {
            self.up.store(up, Ordering::SeqCst);
        }

        pub fn set_fail_listing(&self, fail: bool) {
            self.fail_listing.store(fail, Ordering::SeqCst);
        }

        /// Number of find_queues calls so far
        pub fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueueRepository for MockQueueRepository {
        async fn status(&self) -> Result<RepositoryStatus> {
            Ok(RepositoryStatus {
                up: self.up.load(Ordering::SeqCst),
            })
        }

        async fn find_queues(
            &self,
            offset: usize,
            limit: Option<usize>,
        ) -> Result<Vec<QueueDefinition>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(SyncError::Repository("mock listing failure".to_string()));
            }
            let queues = self.queues.lock().unwrap();
            Ok(queues
                .values()
                .skip(offset)
                .take(limit.unwrap_or(usize::MAX))
                .cloned()
                .collect())
        }
    }
}
