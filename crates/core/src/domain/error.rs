// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Queue definition has an empty id")]
    EmptyQueueId,
}

pub type Result<T> = std::result::Result<T, DomainError>;
