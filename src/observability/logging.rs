//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.

use crate::config::ObservabilityConfig;
use crate::errors::{Result, SwitchyardError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Installing twice is not
/// an error (integration tests share one process).
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives),
        Err(_) => EnvFilter::try_new(&config.log_level),
    }
    .map_err(|e| SwitchyardError::config(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logging {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if installed.is_err() {
        // Subscriber already set elsewhere; keep it.
        return Ok(());
    }

    tracing::info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json_logging = config.json_logging,
        "Logging initialized"
    );
    Ok(())
}

/// Create a tracing span for an aggregator watch
#[macro_export]
macro_rules! aggregator_span {
    ($namespace:expr) => {
        tracing::info_span!(
            "aggregator_watch",
            namespace = %$namespace,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($namespace:expr, $($field:tt)*) => {
        tracing::info_span!(
            "aggregator_watch",
            namespace = %$namespace,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for xDS operations
#[macro_export]
macro_rules! xds_span {
    ($operation:expr, $node_id:expr) => {
        tracing::info_span!(
            "xds_operation",
            operation = %$operation,
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $node_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "xds_operation",
            operation = %$operation,
            node_id = %$node_id,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}
