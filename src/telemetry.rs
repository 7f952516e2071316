//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use crate::config::{LogFormat, ObservabilityConfig};
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Default filter directive for `level`
///
/// HTTP spans from tower-http stay at debug so `RUST_LOG=debug` shows them
/// alongside the crate's own events.
pub fn default_directive(level: &str) -> String {
    format!("chatroute={},tower_http=debug", level)
}

/// Initialize tracing subscriber for structured logging
///
/// This can only be called once per process. Subsequent calls are silently ignored.
///
/// `RUST_LOG` takes precedence over `config.log_level`.
///
/// # Examples
///
/// ```no_run
/// chatroute::telemetry::init(&chatroute::config::ObservabilityConfig::default());
/// tracing::info!("Application started");
/// ```
pub fn init(config: &ObservabilityConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

        let registry = tracing_subscriber::registry().with(filter);
        match config.log_format {
            LogFormat::Text => registry.with(fmt::layer()).init(),
            LogFormat::Json => registry.with(fmt::layer().json()).init(),
        }
    });
}
