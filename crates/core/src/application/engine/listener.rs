// Background tasks feeding events into the engine
// Listeners hold a Weak reference so a dropped engine stops them too

use super::QueueSyncEngine;
use crate::application::shutdown::ShutdownToken;
use crate::domain::{QueueDefinition, RepositoryStatus};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Status events: each one handled on its own task
pub(super) fn spawn_status_listener(
    engine: Weak<QueueSyncEngine>,
    mut rx: Receiver<RepositoryStatus>,
    mut shutdown: ShutdownToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                msg = rx.recv() => {
                    let Some(strong) = engine.upgrade() else { break };
                    match msg {
                        Ok(status) => {
                            tokio::spawn(async move {
                                strong.on_repository_status_changed(status).await;
                            });
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Status listener lagged, resyncing");
                            tokio::spawn(async move {
                                strong.resync().await;
                            });
                        }
                        Err(RecvError::Closed) => {
                            info!("Status event stream closed");
                            break;
                        }
                    }
                }
            }
        }
        debug!("Status listener stopped");
    })
}

/// Queue events: one task per event so distinct queues reconcile in parallel
pub(super) fn spawn_queue_listener(
    engine: Weak<QueueSyncEngine>,
    mut rx: Receiver<QueueDefinition>,
    mut shutdown: ShutdownToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                msg = rx.recv() => {
                    let Some(strong) = engine.upgrade() else { break };
                    match msg {
                        Ok(queue) => {
                            tokio::spawn(async move {
                                strong.on_queue_changed(&queue).await;
                            });
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Queue listener lagged, resyncing");
                            tokio::spawn(async move {
                                strong.resync().await;
                            });
                        }
                        Err(RecvError::Closed) => {
                            info!("Queue event stream closed");
                            break;
                        }
                    }
                }
            }
        }
        debug!("Queue listener stopped");
    })
}

/// Periodic full sweep
pub(super) fn spawn_resync_timer(
    engine: Weak<QueueSyncEngine>,
    period: Duration,
    mut shutdown: ShutdownToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = period.as_millis() as u64, "Periodic resync enabled");
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; startup already swept
        tick.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = tick.tick() => {
                    let Some(strong) = engine.upgrade() else { break };
                    strong.resync().await;
                }
            }
        }
        debug!("Resync timer stopped");
    })
}
