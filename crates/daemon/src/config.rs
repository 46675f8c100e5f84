//! Daemon configuration from environment variables

use anyhow::{Context, Result};
use qsync_core::{ExecutorConfig, SyncConfig};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "~/.qsync";
const DEFAULT_SERVER_ID: &str = "node-1";

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub server_id: String,
    pub data_dir: PathBuf,
    /// Optional JSON array of queue definitions loaded at startup
    pub queues_file: Option<PathBuf>,
    pub sync: SyncConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_id = get("QSYNC_SERVER_ID").unwrap_or_else(|| DEFAULT_SERVER_ID.to_string());
        let data_dir = get("QSYNC_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let data_dir = PathBuf::from(shellexpand::tilde(&data_dir).into_owned());
        let queues_file = get("QSYNC_QUEUES_FILE")
            .map(|p| PathBuf::from(shellexpand::tilde(&p).into_owned()));

        let mut executor = ExecutorConfig::default();
        if let Some(v) = get("QSYNC_CORE_WORKERS") {
            executor.core_workers = v
                .parse()
                .with_context(|| format!("QSYNC_CORE_WORKERS is not a number: {}", v))?;
        }
        if let Some(v) = get("QSYNC_WORKER_KEEP_ALIVE_SECS") {
            executor.keep_alive = parse_secs("QSYNC_WORKER_KEEP_ALIVE_SECS", &v)?;
        }
        let resync_interval = get("QSYNC_RESYNC_SECS")
            .map(|v| parse_secs("QSYNC_RESYNC_SECS", &v))
            .transpose()?;

        let sync = SyncConfig {
            executor,
            resync_interval,
        };
        sync.validate()?;

        Ok(Self {
            server_id,
            data_dir,
            queues_file,
            sync,
        })
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("{} is not a number of seconds: {}", key, value))?;
    Ok(Duration::from_secs(secs))
}
