// QueueSyncEngine - keeps local buffers in line with the queue repository
//
// Reconciliation is serialized per queue id by a per-id async mutex; distinct
// ids reconcile concurrently. Lookups only touch the registry map and never
// wait on a reconciliation in progress.

mod handle;
mod listener;
mod outcome;

pub use handle::BufferHandle;
pub use outcome::{ReconcileOutcome, RejectedProperty, ShutdownReport, SweepReport};

use crate::application::constants::LISTENER_SHUTDOWN_TIMEOUT;
use crate::application::executor::{log_worker_failure, ExecutorStats, WorkerPool};
use crate::application::shutdown::{shutdown_channel, ShutdownSender};
use crate::config::SyncConfig;
use crate::domain::{QueueDefinition, QueueId, RepositoryStatus, Role};
use crate::error::Result;
use crate::port::{
    BufferFactory, EventSource, FailureSink, QueueRepository, ServerIdentity, StorageLocator,
    TaskExecutor, TimeProvider, ALL_QUEUES,
};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Collaborators injected into the engine (DI wiring happens in the daemon)
#[derive(Clone)]
pub struct EngineDeps {
    pub identity: Arc<dyn ServerIdentity>,
    pub repository: Arc<dyn QueueRepository>,
    pub storage: Arc<dyn StorageLocator>,
    pub buffers: Arc<dyn BufferFactory>,
    pub events: Arc<dyn EventSource>,
    pub time_provider: Arc<dyn TimeProvider>,
}

/// Per-id reconciliation state, guarded by the per-id mutex
///
/// Slots are never pruned, including for ids this node never held: dropping
/// one would forget `last_version` and let a delayed older event reopen a
/// buffer. Memory grows with the number of distinct queue ids.
#[derive(Debug, Default)]
struct SlotState {
    last_version: Option<u64>,
}

type Slot = Arc<tokio::sync::Mutex<SlotState>>;

/// Synchronizes this node's open buffers with the queue repository
pub struct QueueSyncEngine {
    server_id: String,
    repository: Arc<dyn QueueRepository>,
    storage: Arc<dyn StorageLocator>,
    buffers: Arc<dyn BufferFactory>,
    time_provider: Arc<dyn TimeProvider>,
    executor: Arc<WorkerPool>,
    registry: DashMap<QueueId, Arc<BufferHandle>>,
    slots: DashMap<QueueId, Slot>,
    shutting_down: AtomicBool,
    shutdown_tx: ShutdownSender,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueSyncEngine {
    /// Start the engine with worker failures going to the log
    pub async fn start(deps: EngineDeps, config: SyncConfig) -> Result<Arc<Self>> {
        Self::start_with_failure_sink(deps, config, Arc::new(log_worker_failure)).await
    }

    /// Start the engine
    ///
    /// Subscribes to both event kinds before checking the repository status,
    /// so an "up" published during startup is never missed. If the repository
    /// is already up a full sweep runs before this returns.
    ///
    /// # Errors
    /// - SyncError::Config if `config` is invalid
    /// - SyncError::Executor if the worker pool cannot start
    pub async fn start_with_failure_sink(
        deps: EngineDeps,
        config: SyncConfig,
        failure_sink: FailureSink,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let executor = Arc::new(WorkerPool::new(config.executor.clone(), failure_sink)?);
        let status_rx = deps.events.subscribe_status();
        let queue_rx = deps.events.subscribe_queues();
        let (shutdown_tx, shutdown_token) = shutdown_channel();

        let engine = Arc::new(Self {
            server_id: deps.identity.id().to_string(),
            repository: deps.repository,
            storage: deps.storage,
            buffers: deps.buffers,
            time_provider: deps.time_provider,
            executor,
            registry: DashMap::new(),
            slots: DashMap::new(),
            shutting_down: AtomicBool::new(false),
            shutdown_tx,
            listeners: Mutex::new(Vec::new()),
        });
        info!(server_id = %engine.server_id, "Queue sync engine starting");

        match engine.repository.status().await {
            Ok(status) if status.is_up() => {
                engine.sync_all().await;
            }
            Ok(_) => info!("Queue repository is down, waiting for it to come up"),
            Err(e) => warn!(error = %e, "Could not read queue repository status"),
        }

        let weak = Arc::downgrade(&engine);
        let mut handles = vec![
            listener::spawn_status_listener(weak.clone(), status_rx, shutdown_token.clone()),
            listener::spawn_queue_listener(weak.clone(), queue_rx, shutdown_token.clone()),
        ];
        if let Some(period) = config.resync_interval {
            handles.push(listener::spawn_resync_timer(weak, period, shutdown_token));
        }
        *engine.listeners.lock().unwrap_or_else(PoisonError::into_inner) = handles;

        Ok(engine)
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Repository up: full sweep. Down: nothing is closed.
    pub async fn on_repository_status_changed(&self, status: RepositoryStatus) -> Option<SweepReport> {
        if status.is_up() {
            info!("Queue repository is up, syncing all queues");
            Some(self.sync_all().await)
        } else {
            // Open buffers stay open; per-queue events drive any teardown
            info!("Queue repository is down, keeping open buffers");
            None
        }
    }

    pub async fn on_queue_changed(&self, queue: &QueueDefinition) -> ReconcileOutcome {
        self.reconcile(queue).await
    }

    /// Sweep only if the repository is currently up
    pub async fn resync(&self) -> Option<SweepReport> {
        match self.repository.status().await {
            Ok(status) if status.is_up() => Some(self.sync_all().await),
            Ok(_) => {
                debug!("Skipping resync, queue repository is down");
                None
            }
            Err(e) => {
                warn!(error = %e, "Skipping resync, could not read repository status");
                None
            }
        }
    }

    /// Reconcile every definition the repository currently lists
    ///
    /// Never fails: a listing error or a failing queue is logged and reported.
    pub async fn sync_all(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let queues = match self.repository.find_queues(0, ALL_QUEUES).await {
            Ok(queues) => queues,
            Err(e) => {
                error!(error = %e, "Error syncing queues: listing failed");
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        let outcomes = join_all(queues.iter().map(|q| self.reconcile(q))).await;
        for (queue, outcome) in queues.iter().zip(outcomes.iter()) {
            report.record(&queue.id, outcome);
        }

        info!(
            total = report.total,
            opened = report.opened,
            updated = report.updated,
            closed = report.closed,
            failed = report.failed.len(),
            "Queue sync complete"
        );
        report
    }

    /// Bring the local buffer for `queue` in line with the definition
    ///
    /// Idempotent for an unchanged definition. Never fails: problems are
    /// logged and returned as the outcome.
    pub async fn reconcile(&self, queue: &QueueDefinition) -> ReconcileOutcome {
        if let Err(e) = queue.validate() {
            warn!(queue_id = %queue.id, error = %e, "Ignoring invalid queue definition");
            return ReconcileOutcome::Invalid(e);
        }

        let slot = self.slot(&queue.id);
        let mut state = slot.lock().await;

        if self.is_shutting_down() {
            debug!(queue_id = %queue.id, "Engine shutting down, skipping reconcile");
            return ReconcileOutcome::Skipped;
        }
        if let Some(latest) = state.last_version {
            if queue.version < latest {
                debug!(
                    queue_id = %queue.id,
                    latest,
                    received = queue.version,
                    "Ignoring stale queue definition"
                );
                return ReconcileOutcome::Stale {
                    latest,
                    received: queue.version,
                };
            }
        }

        let role = queue.role_of(&self.server_id);
        let existing = self.lookup(&queue.id);

        let outcome = if role.holds_buffer() {
            let (handle, opened) = match existing {
                Some(handle) => {
                    debug!(queue_id = %queue.id, role = %role, "Updating buffer");
                    (handle, false)
                }
                None => match self.open_handle(queue, role).await {
                    Ok(handle) => (handle, true),
                    Err(outcome) => return outcome,
                },
            };

            handle
                .buffer()
                .bind_executor(Arc::clone(&self.executor) as Arc<dyn TaskExecutor>);
            let rejected = self.apply_properties(&handle, queue);
            handle.record(role, queue.version, self.time_provider.now_millis());
            // TODO: start replication from the master once slave wiring exists

            if opened {
                self.registry.insert(queue.id.clone(), handle);
                ReconcileOutcome::Opened { role, rejected }
            } else {
                ReconcileOutcome::Updated { role, rejected }
            }
        } else if let Some(handle) = existing {
            info!(queue_id = %queue.id, "Closing buffer, this server is not master or slave");
            let clean = self.close_handle(&handle).await;
            self.registry.remove(&queue.id);
            ReconcileOutcome::Closed { clean }
        } else {
            ReconcileOutcome::NotMember
        };

        state.last_version = Some(queue.version);
        outcome
    }

    /// Open handle for `queue_id`, if any. Never blocks on reconciliation.
    pub fn lookup(&self, queue_id: &str) -> Option<Arc<BufferHandle>> {
        self.registry.get(queue_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Ids with an open buffer, in no particular order
    pub fn open_queue_ids(&self) -> Vec<QueueId> {
        self.registry.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Shared executor bound to every open buffer
    pub fn executor(&self) -> Arc<dyn TaskExecutor> {
        Arc::clone(&self.executor) as Arc<dyn TaskExecutor>
    }

    pub fn executor_stats(&self) -> ExecutorStats {
        self.executor.stats()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Stop reconciling, close every buffer, then shut the executor down
    ///
    /// Buffers are closed before the executor so their background work still
    /// has somewhere to run while closing. Close failures are logged and do
    /// not stop the sweep. Calling this twice is a no-op.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return report;
        }
        info!(open_buffers = self.registry.len(), "Queue sync engine shutting down");

        self.shutdown_tx.shutdown();
        let listeners =
            std::mem::take(&mut *self.listeners.lock().unwrap_or_else(PoisonError::into_inner));
        for listener in listeners {
            if tokio::time::timeout(LISTENER_SHUTDOWN_TIMEOUT, listener).await.is_err() {
                warn!("Event listener did not stop in time");
            }
        }

        // Taking each slot waits out an in-flight reconcile of that id
        let slots: Vec<(QueueId, Slot)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        for (queue_id, slot) in slots {
            let _state = slot.lock().await;
            if let Some((_, handle)) = self.registry.remove(&queue_id) {
                if self.close_handle(&handle).await {
                    report.closed += 1;
                } else {
                    report.close_failures += 1;
                }
            }
        }

        let executor = Arc::clone(&self.executor);
        if let Err(e) = tokio::task::spawn_blocking(move || executor.shutdown()).await {
            error!(error = %e, "Executor shutdown task failed");
        }

        info!(
            closed = report.closed,
            close_failures = report.close_failures,
            "Queue sync engine stopped"
        );
        report
    }

    fn slot(&self, queue_id: &str) -> Slot {
        if let Some(slot) = self.slots.get(queue_id) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(queue_id.to_string())
                .or_default()
                .value(),
        )
    }

    /// Locate and open the buffer; nothing is registered here
    async fn open_handle(
        &self,
        queue: &QueueDefinition,
        role: Role,
    ) -> std::result::Result<Arc<BufferHandle>, ReconcileOutcome> {
        let directory = match self.storage.find_directory(queue) {
            Ok(dir) => dir,
            Err(e) => {
                error!(queue_id = %queue.id, error = %e, "Error locating storage for queue");
                return Err(ReconcileOutcome::Failed {
                    operation: "locate",
                    error: e.to_string(),
                });
            }
        };

        let buffer = match self.buffers.open_or_create(&directory).await {
            Ok(buffer) => buffer,
            Err(e) => {
                error!(
                    queue_id = %queue.id,
                    directory = %directory.display(),
                    error = %e,
                    "Error creating buffer for queue"
                );
                return Err(ReconcileOutcome::Failed {
                    operation: "open",
                    error: e.to_string(),
                });
            }
        };

        info!(
            queue_id = %queue.id,
            role = %role,
            directory = %directory.display(),
            "Opened buffer"
        );
        Ok(Arc::new(BufferHandle::new(
            queue.id.clone(),
            directory,
            buffer,
            role,
            queue.version,
            self.time_provider.now_millis(),
        )))
    }

    /// Apply both limits independently; a rejection only affects its property
    fn apply_properties(&self, handle: &BufferHandle, queue: &QueueDefinition) -> Vec<RejectedProperty> {
        let mut rejected = Vec::new();

        if let Err(e) = handle.buffer().set_max_payload_size(queue.max_payload_size) {
            error!(
                queue_id = %queue.id,
                value = queue.max_payload_size,
                error = %e,
                "Error updating max_payload_size"
            );
            rejected.push(RejectedProperty {
                property: "max_payload_size",
                value: queue.max_payload_size,
                error: e,
            });
        }

        if let Err(e) = handle.buffer().set_max_size(queue.max_size) {
            error!(
                queue_id = %queue.id,
                value = queue.max_size,
                error = %e,
                "Error updating max_size"
            );
            rejected.push(RejectedProperty {
                property: "max_size",
                value: queue.max_size,
                error: e,
            });
        }

        rejected
    }

    /// Close the buffer; returns false if close reported a failure
    async fn close_handle(&self, handle: &BufferHandle) -> bool {
        let now = self.time_provider.now_millis();
        match handle.buffer().close().await {
            Ok(()) => {
                info!(
                    queue_id = %handle.queue_id(),
                    role = %handle.role(),
                    version = handle.version(),
                    held_ms = now - handle.opened_at_millis(),
                    since_update_ms = now - handle.updated_at_millis(),
                    "Closed buffer"
                );
                true
            }
            Err(e) => {
                error!(queue_id = %handle.queue_id(), error = %e, "Error closing buffer");
                false
            }
        }
    }
}
