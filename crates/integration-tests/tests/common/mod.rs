//! Shared wiring for integration tests

#![allow(dead_code)]

use qsync_core::application::{EngineDeps, QueueSyncEngine};
use qsync_core::port::time_provider::SystemTimeProvider;
use qsync_core::{ExecutorConfig, SyncConfig};
use qsync_infra_fs::{DataDirStorageLocator, DirectoryBufferFactory};
use qsync_infra_system::{InMemoryEventBus, InMemoryQueueRepository, StaticServerIdentity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct Node {
    pub data_dir: tempfile::TempDir,
    pub bus: Arc<InMemoryEventBus>,
    pub repository: Arc<InMemoryQueueRepository>,
}

impl Node {
    pub fn new() -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        Self {
            data_dir: tempfile::tempdir().unwrap(),
            repository: Arc::new(InMemoryQueueRepository::new(Some(bus.clone()))),
            bus,
        }
    }

    pub fn deps(&self, server_id: &str) -> EngineDeps {
        EngineDeps {
            identity: Arc::new(StaticServerIdentity::new(server_id)),
            repository: self.repository.clone(),
            storage: Arc::new(DataDirStorageLocator::new(self.data_dir.path())),
            buffers: Arc::new(DirectoryBufferFactory::new()),
            events: self.bus.clone(),
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub async fn start(&self, server_id: &str) -> Arc<QueueSyncEngine> {
        QueueSyncEngine::start(self.deps(server_id), config())
            .await
            .unwrap()
    }

    pub fn queue_dir(&self, queue_id: &str) -> PathBuf {
        self.data_dir.path().join("queues").join(queue_id)
    }
}

pub fn config() -> SyncConfig {
    SyncConfig {
        executor: ExecutorConfig {
            core_workers: 1,
            keep_alive: Duration::from_secs(5),
            thread_name_prefix: "it-queue-sync".to_string(),
        },
        resync_interval: None,
    }
}

/// Poll `condition` for up to ~2s
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub async fn read_settings(dir: &Path) -> serde_json::Value {
    let bytes = tokio::fs::read(dir.join("buffer.json")).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
