// Qsync Core - Domain Logic & Ports
// NO infrastructure dependencies (ADR-001: Hexagonal Architecture)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::{ExecutorConfig, SyncConfig};
pub use error::{Result, SyncError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
