// Buffer handle: one open buffer owned by the engine's registry

use crate::domain::{QueueId, Role};
use crate::port::PersistentBuffer;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy)]
struct HandleState {
    role: Role,
    version: u64,
    updated_at: i64,
}

/// Open buffer for exactly one queue id
///
/// The role is recorded for replication, which is not wired yet: a slave
/// handle behaves exactly like a master handle.
pub struct BufferHandle {
    queue_id: QueueId,
    directory: PathBuf,
    buffer: Arc<dyn PersistentBuffer>,
    opened_at: i64,
    state: RwLock<HandleState>,
}

impl BufferHandle {
    pub(crate) fn new(
        queue_id: QueueId,
        directory: PathBuf,
        buffer: Arc<dyn PersistentBuffer>,
        role: Role,
        version: u64,
        now_millis: i64,
    ) -> Self {
        Self {
            queue_id,
            directory,
            buffer,
            opened_at: now_millis,
            state: RwLock::new(HandleState {
                role,
                version,
                updated_at: now_millis,
            }),
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn buffer(&self) -> &Arc<dyn PersistentBuffer> {
        &self.buffer
    }

    pub fn role(&self) -> Role {
        self.read().role
    }

    /// Definition version last applied to this handle
    pub fn version(&self) -> u64 {
        self.read().version
    }

    pub fn opened_at_millis(&self) -> i64 {
        self.opened_at
    }

    pub fn updated_at_millis(&self) -> i64 {
        self.read().updated_at
    }

    pub(crate) fn record(&self, role: Role, version: u64, now_millis: i64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.role = role;
        state.version = version;
        state.updated_at = now_millis;
    }

    fn read(&self) -> HandleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("BufferHandle")
            .field("queue_id", &self.queue_id)
            .field("directory", &self.directory)
            .field("role", &state.role)
            .field("version", &state.version)
            .finish()
    }
}
