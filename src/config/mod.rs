//! # Configuration Management
//!
//! Layered configuration for the Switchyard control plane: built-in defaults,
//! an optional YAML/TOML/JSON file, then `SWITCHYARD__*` environment variables
//! (e.g. `SWITCHYARD__SANITIZER__ENABLED=true`).

pub mod settings;

pub use settings::{
    AggregatorConfig, AppConfig, DiscoveryConfig, ObservabilityConfig, SanitizerConfig,
    SourceConfig, SourceKind,
};
