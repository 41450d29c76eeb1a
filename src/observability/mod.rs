//! # Observability Infrastructure
//!
//! Structured logging and metrics for the Switchyard control plane.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::MetricsRecorder;
