//! Logging setup (tracing-subscriber, optional rolling file)

use crate::telemetry::telemetry_layer;
use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter (default: `qsync=info`)
/// - `QSYNC_LOG_FORMAT`: `json` or `pretty` (default)
/// - `QSYNC_LOG_DIR`: also write JSON logs to a daily rolling file there
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: see [`crate::telemetry`]
///
/// The returned guard must live until exit so buffered file logs are flushed.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("QSYNC_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("qsync=info"))
        .map_err(|e| anyhow!("Failed to create env filter: {}", e))?;

    let telemetry = telemetry_layer()?;

    let mut guard = None;
    let file_writer = std::env::var("QSYNC_LOG_DIR").ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "qsync.log");
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);
        writer
    });

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(telemetry)
                .with(env_filter)
                .with(fmt::layer().json())
                .with(file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w)))
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(telemetry)
                .with(env_filter)
                .with(fmt::layer().pretty())
                .with(file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w)))
                .init();
        }
    }

    Ok(guard)
}
