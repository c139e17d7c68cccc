//! Process wiring for the CQRS runtime.
//!
//! [`Runtime`] owns the process's [`CqrsBus`]. Build it once at startup
//! with [`Runtime::init`], hand [`Runtime::bus`] to whatever registers
//! handlers or dispatches operations, and call [`Runtime::shutdown`] on the
//! way out.

pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::Arc;

use bus::{CqrsBus, LoggingMiddleware, MetricsMiddleware};

pub use config::{Config, LogFormat};
pub use error::{Result, RuntimeError};

pub struct Runtime {
    config: Config,
    bus: Arc<CqrsBus>,
}

impl Runtime {
    /// Creates the bus and installs the middleware `config` asks for.
    ///
    /// Telemetry is not touched; see [`telemetry::init`].
    #[tracing::instrument(skip_all, fields(allow_override = config.allow_handler_override))]
    pub fn init(config: Config) -> Self {
        let bus = Arc::new(CqrsBus::new(config.allow_handler_override));

        if config.log_dispatch {
            let logging = Arc::new(LoggingMiddleware::new());
            bus.add_command_middleware(logging.clone());
            bus.add_query_middleware(logging);
        }
        if config.metrics_enabled {
            let metering = Arc::new(MetricsMiddleware::new());
            bus.add_command_middleware(metering.clone());
            bus.add_query_middleware(metering);
        }

        tracing::info!(
            command_middleware = ?bus.command_bus().middleware_names(),
            query_middleware = ?bus.query_bus().middleware_names(),
            "runtime initialized"
        );
        Self { config, bus }
    }

    pub fn bus(&self) -> Arc<CqrsBus> {
        Arc::clone(&self.bus)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shuts the bus down. Later dispatches fail with `BusNotInitialized`.
    pub fn shutdown(&self) {
        self.bus.shutdown();
    }
}
