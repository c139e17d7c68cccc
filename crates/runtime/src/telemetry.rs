//! Tracing subscriber and metrics recorder installation.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::Result;
use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
///
/// An invalid filter directive falls back to `info`.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }
    Ok(())
}

/// Installs the Prometheus recorder when metrics are enabled.
pub fn init_metrics(config: &Config) -> Result<Option<PrometheusHandle>> {
    if !config.metrics_enabled {
        return Ok(None);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(Some(handle))
}

/// Installs tracing and, when enabled, the metrics recorder.
pub fn init(config: &Config) -> Result<Option<PrometheusHandle>> {
    init_tracing(config)?;
    let handle = init_metrics(config)?;
    tracing::info!(
        log_format = ?config.log_format,
        metrics_enabled = config.metrics_enabled,
        "telemetry initialized"
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_disabled_installs_nothing() {
        let handle = init_metrics(&Config::default()).unwrap();
        assert!(handle.is_none());
    }
}
