// Queue Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Queue identifier (unique across the cluster)
pub type QueueId = String;

/// Cluster node identifier
pub type ServerId = String;

/// Role of a node relative to one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Accepts primary writes
    Master,
    /// Reserved for replication (not wired yet)
    Slave,
    None,
}

impl Role {
    /// Whether this role requires a local buffer
    pub fn holds_buffer(self) -> bool {
        !matches!(self, Role::None)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Master => write!(f, "MASTER"),
            Role::Slave => write!(f, "SLAVE"),
            Role::None => write!(f, "NONE"),
        }
    }
}

/// Up/down status of the queue repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    pub up: bool,
}

impl RepositoryStatus {
    pub const UP: RepositoryStatus = RepositoryStatus { up: true };
    pub const DOWN: RepositoryStatus = RepositoryStatus { up: false };

    pub fn is_up(&self) -> bool {
        self.up
    }
}

/// Cluster-wide queue definition snapshot
///
/// Owned and versioned by the queue repository. The engine only keeps the
/// latest snapshot it has seen for each id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDefinition {
    pub id: QueueId,
    pub master_server_id: ServerId,
    #[serde(default)]
    pub slave_server_ids: BTreeSet<ServerId>,
    pub max_payload_size: i64,
    pub max_size: i64,
    /// Monotonic per id, assigned by the repository
    #[serde(default)]
    pub version: u64,
}

impl QueueDefinition {
    /// Create a definition mastered by `master` with no slaves
    pub fn new(id: impl Into<String>, master: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            master_server_id: master.into(),
            slave_server_ids: BTreeSet::new(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            version: 0,
        }
    }

    pub fn with_slaves<I, S>(mut self, slaves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slave_server_ids = slaves.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limits(mut self, max_payload_size: i64, max_size: i64) -> Self {
        self.max_payload_size = max_payload_size;
        self.max_size = max_size;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// An unassigned (empty) master matches no server
    pub fn is_master(&self, server_id: &str) -> bool {
        !self.master_server_id.is_empty() && self.master_server_id == server_id
    }

    pub fn is_slave(&self, server_id: &str) -> bool {
        self.slave_server_ids.contains(server_id)
    }

    /// Role of `server_id` for this queue (master wins over slave)
    pub fn role_of(&self, server_id: &str) -> Role {
        if self.is_master(server_id) {
            Role::Master
        } else if self.is_slave(server_id) {
            Role::Slave
        } else {
            Role::None
        }
    }

    /// Structural checks (limits are validated by the buffer itself)
    ///
    /// The master may be empty while the cluster reassigns it.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::EmptyQueueId);
        }
        Ok(())
    }
}

impl std::fmt::Display for QueueDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queue {} v{} (master {})", self.id, self.version, self.master_server_id)
    }
}

/// Default max payload size for new definitions (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: i64 = 1024 * 1024;

/// Default max buffer size for new definitions (100 MiB)
pub const DEFAULT_MAX_SIZE: i64 = 100 * 1024 * 1024;
