//! Qsync - Node daemon
//! Keeps this node's queue buffers in sync with the queue repository

mod config;
mod logging;
mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

// Import workspace crates
use config::DaemonConfig;
use qsync_core::application::{EngineDeps, QueueSyncEngine};
use qsync_core::port::time_provider::SystemTimeProvider;
use qsync_infra_fs::{DataDirStorageLocator, DirectoryBufferFactory};
use qsync_infra_system::{InMemoryEventBus, InMemoryQueueRepository, StaticServerIdentity};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (guard flushes the log file on exit)
    let _log_guard = logging::init_logging()?;
    info!("Qsync v{} starting...", VERSION);

    // 2. Load configuration
    let config = DaemonConfig::from_env()?;
    info!(
        server_id = %config.server_id,
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );

    // 3. Setup adapters (DI wiring)
    let event_bus = Arc::new(InMemoryEventBus::new());
    let repository = Arc::new(InMemoryQueueRepository::new(Some(event_bus.clone())));
    if let Some(path) = &config.queues_file {
        repository.load_json(path).await?;
    }
    repository.set_up(true);

    let deps = EngineDeps {
        identity: Arc::new(StaticServerIdentity::new(config.server_id.clone())),
        repository: repository.clone(),
        storage: Arc::new(DataDirStorageLocator::new(&config.data_dir)),
        buffers: Arc::new(DirectoryBufferFactory::new()),
        events: event_bus,
        time_provider: Arc::new(SystemTimeProvider),
    };

    // 4. Start the engine (sweeps immediately since the repository is up)
    let engine = QueueSyncEngine::start(deps, config.sync.clone()).await?;
    let mut open = engine.open_queue_ids();
    open.sort();
    info!(
        queues = repository.len(),
        open_buffers = open.len(),
        open = ?open,
        "System ready"
    );
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown: buffers first, then the executor
    let report = engine.shutdown().await;
    if report.close_failures > 0 {
        warn!(close_failures = report.close_failures, "Some buffers failed to close");
    }
    telemetry::shutdown_telemetry();

    info!(closed = report.closed, "Shutdown complete.");
    Ok(())
}
