//! Runtime error types.

use thiserror::Error;

/// Errors raised while setting up the process.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A global tracing subscriber is already installed.
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    /// The Prometheus recorder could not be installed.
    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// Registration or dispatch failed at the bus level.
    #[error(transparent)]
    Bus(#[from] operations::CqrsError),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
