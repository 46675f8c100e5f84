// Data-dir storage locator
// <data_dir>/queues/<escaped queue id>

use qsync_core::domain::QueueDefinition;
use qsync_core::error::{Result, SyncError};
use qsync_core::port::StorageLocator;
use std::path::{Path, PathBuf};

const QUEUES_DIR: &str = "queues";

/// Places every queue under one data directory
pub struct DataDirStorageLocator {
    queues_dir: PathBuf,
}

impl DataDirStorageLocator {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            queues_dir: data_dir.as_ref().join(QUEUES_DIR),
        }
    }

    pub fn queues_dir(&self) -> &Path {
        &self.queues_dir
    }
}

impl StorageLocator for DataDirStorageLocator {
    fn find_directory(&self, queue: &QueueDefinition) -> Result<PathBuf> {
        if queue.id.is_empty() || queue.id == "." || queue.id == ".." {
            return Err(SyncError::Storage(format!(
                "queue id {:?} cannot be used as a directory name",
                queue.id
            )));
        }
        Ok(self.queues_dir.join(escape_component(&queue.id)))
    }
}

/// Percent-escape everything outside [A-Za-z0-9._-] so ids map 1:1 to names
fn escape_component(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
