// Results of reconciliation, reported as data rather than errors

use crate::domain::{DomainError, QueueId, Role};
use crate::port::BufferError;

/// A property the buffer refused; the previous value stays in effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedProperty {
    pub property: &'static str,
    pub value: i64,
    pub error: BufferError,
}

/// What a single reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// New buffer opened and registered
    Opened {
        role: Role,
        rejected: Vec<RejectedProperty>,
    },
    /// Existing buffer re-bound and reconfigured
    Updated {
        role: Role,
        rejected: Vec<RejectedProperty>,
    },
    /// Role lost: buffer closed and removed (`clean` is false if close failed)
    Closed { clean: bool },
    /// No role and no buffer
    NotMember,
    /// An older version than one already processed
    Stale { latest: u64, received: u64 },
    /// Buffer could not be opened; nothing registered, retried on next event
    Failed { operation: &'static str, error: String },
    Invalid(DomainError),
    /// Engine is shutting down
    Skipped,
}

impl ReconcileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ReconcileOutcome::Failed { .. } | ReconcileOutcome::Invalid(_))
    }

    pub fn rejected(&self) -> &[RejectedProperty] {
        match self {
            ReconcileOutcome::Opened { rejected, .. } | ReconcileOutcome::Updated { rejected, .. } => {
                rejected
            }
            _ => &[],
        }
    }
}

/// Summary of a full sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub total: usize,
    pub opened: usize,
    pub updated: usize,
    pub closed: usize,
    pub failed: Vec<QueueId>,
    /// Set when the repository could not be listed at all
    pub listing_error: Option<String>,
}

impl SweepReport {
    pub(crate) fn record(&mut self, queue_id: &str, outcome: &ReconcileOutcome) {
        self.total += 1;
        match outcome {
            ReconcileOutcome::Opened { .. } => self.opened += 1,
            ReconcileOutcome::Updated { .. } => self.updated += 1,
            ReconcileOutcome::Closed { .. } => self.closed += 1,
            o if o.is_failure() => self.failed.push(queue_id.to_string()),
            _ => {}
        }
    }

    /// Every listed definition reconciled without failure
    pub fn is_clean(&self) -> bool {
        self.listing_error.is_none() && self.failed.is_empty()
    }
}

/// Summary of engine shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub closed: usize,
    pub close_failures: usize,
}
