// Storage Locator Port
// Maps a queue definition to the directory holding its buffer

use crate::domain::QueueDefinition;
use crate::error::Result;
use std::path::PathBuf;

/// Resolves the storage directory of a queue
///
/// Must be deterministic per queue id: the same id always maps to the same
/// directory, otherwise a reopened buffer would lose its messages.
pub trait StorageLocator: Send + Sync {
    fn find_directory(&self, queue: &QueueDefinition) -> Result<PathBuf>;
}

pub mod mocks {
    use super::*;
    use crate::error::SyncError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Locator rooted at a fixed (not necessarily existing) path
    pub struct MockStorageLocator {
        root: PathBuf,
        failing: Mutex<HashSet<String>>,
    }

    impl MockStorageLocator {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                failing: Mutex::new(HashSet::new()),
            }
        }

        /// Make lookups for `queue_id` fail
        pub fn fail_for(&self, queue_id: impl Into<String>) {
            self.failing.lock().unwrap().insert(queue_id.into());
        }
    }

    impl StorageLocator for MockStorageLocator {
        fn find_directory(&self, queue: &QueueDefinition) -> Result<PathBuf> {
            if self.failing.lock().unwrap().contains(&queue.id) {
                return Err(SyncError::Storage(format!(
                    "no storage configured for {}",
                    queue.id
                )));
            }
            Ok(self.root.join(&queue.id))
        }
    }
}
