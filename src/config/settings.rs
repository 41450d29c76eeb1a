//! # Configuration Settings
//!
//! Defines the configuration structure for the Switchyard control plane.

use crate::errors::{Result, SwitchyardError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// xDS sanitizer configuration
    #[validate(nested)]
    pub sanitizer: SanitizerConfig,

    /// Background discovery poller configuration
    #[validate(nested)]
    pub discovery: DiscoveryConfig,

    /// Snapshot aggregator configuration
    #[validate(nested)]
    pub aggregator: AggregatorConfig,

    /// Resource sources fanned into the aggregator, in registration order
    #[validate(nested)]
    pub sources: Vec<SourceConfig>,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from an optional file layered under `SWITCHYARD__*`
    /// environment variables.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }
        let loaded: AppConfig = builder
            .add_source(
                config::Environment::with_prefix("SWITCHYARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SwitchyardError::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Cross-field validation the validator crate cannot express
    fn validate_custom(&self) -> Result<()> {
        if self.discovery.max_backoff_millis < self.discovery.initial_backoff_millis {
            return Err(SwitchyardError::config(
                "discovery.max_backoff_millis must be >= discovery.initial_backoff_millis",
            ));
        }

        if self.sanitizer.fallback_cluster_name == self.sanitizer.fallback_listener_name {
            return Err(SwitchyardError::config(
                "Fallback listener and cluster names must differ",
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(SwitchyardError::config(format!(
                    "Duplicate source name '{}'",
                    source.name
                )));
            }
            if source.kind == SourceKind::File && source.path.is_none() {
                return Err(SwitchyardError::config(format!(
                    "File source '{}' requires a path",
                    source.name
                )));
            }
        }

        Ok(())
    }
}

/// Route-replacing sanitizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Replace invalid routes with the fallback destination. When disabled,
    /// warnings are promoted to errors instead.
    pub enabled: bool,

    /// Status code returned by the fallback listener
    #[validate(range(min = 100, max = 599, message = "Fallback status must be a valid HTTP status"))]
    pub fallback_status_code: u32,

    /// Body returned by the fallback listener
    pub fallback_body: String,

    #[validate(length(min = 1, message = "Fallback listener name cannot be empty"))]
    pub fallback_listener_name: String,

    #[validate(length(min = 1, message = "Fallback cluster name cannot be empty"))]
    pub fallback_cluster_name: String,

    #[validate(length(min = 1, message = "Fallback bind address cannot be empty"))]
    pub fallback_bind_address: String,

    #[validate(range(min = 1, max = 65535, message = "Fallback port must be between 1 and 65535"))]
    pub fallback_port: u16,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fallback_status_code: 500,
            fallback_body: "Invalid route configuration".to_string(),
            fallback_listener_name: "fallback_listener_for_invalid_routes".to_string(),
            fallback_cluster_name: "fallback_cluster_for_invalid_routes".to_string(),
            fallback_bind_address: "127.0.0.1".to_string(),
            fallback_port: 8080,
        }
    }
}

/// Discovery poller configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Sleep between two backoff-wrapped attempts
    #[validate(range(min = 1, max = 86400, message = "Poll interval must be between 1s and 24h"))]
    pub poll_interval_seconds: u64,

    #[validate(range(min = 1, message = "Initial backoff must be at least 1ms"))]
    pub initial_backoff_millis: u64,

    #[validate(range(min = 1, message = "Max backoff must be at least 1ms"))]
    pub max_backoff_millis: u64,

    #[validate(range(min = 1.0, max = 10.0, message = "Backoff multiplier must be between 1 and 10"))]
    pub backoff_multiplier: f64,

    /// Attempts per cycle before giving up until the next poll
    #[validate(range(min = 1, message = "At least one attempt is required"))]
    pub max_attempts: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
            initial_backoff_millis: 500,
            max_backoff_millis: 30_000,
            backoff_multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_millis)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_millis)
    }
}

/// Snapshot aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Debounce tick between merged emissions
    #[validate(range(min = 10, max = 60000, message = "Debounce must be between 10ms and 60s"))]
    pub debounce_millis: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { debounce_millis: 1000 }
    }
}

impl AggregatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }
}

/// Kind of backend behind a configured source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Memory,
}

/// One resource source registered with the aggregator
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    #[validate(length(min = 1, message = "Source name cannot be empty"))]
    pub name: String,

    pub kind: SourceKind,

    /// Directory holding resource files (file sources)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Re-list interval for polling sources
    #[serde(default = "default_refresh_seconds")]
    #[validate(range(min = 1, max = 3600, message = "Refresh must be between 1s and 1h"))]
    pub refresh_seconds: u64,
}

fn default_refresh_seconds() -> u64 {
    5
}

impl SourceConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing service name
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "switchyard".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_source(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            kind: SourceKind::File,
            path: Some(PathBuf::from("/tmp/resources")),
            refresh_seconds: 5,
        }
    }

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.sanitizer.enabled, "sanitizer must default to strict mode");
    }

    #[test]
    fn test_discovery_durations() {
        let config = DiscoveryConfig {
            poll_interval_seconds: 45,
            initial_backoff_millis: 250,
            max_backoff_millis: 4000,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(45));
        assert_eq!(config.initial_backoff(), Duration::from_millis(250));
        assert_eq!(config.max_backoff(), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_bounds_are_checked() {
        let mut config = AppConfig::default();
        config.discovery.initial_backoff_millis = 5000;
        config.discovery.max_backoff_millis = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_fallback_status() {
        let mut config = AppConfig::default();
        config.sanitizer.fallback_status_code = 99;
        assert!(config.validate().is_err());

        config.sanitizer.fallback_status_code = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_source_names_rejected() {
        let mut config = AppConfig::default();
        config.sources = vec![file_source("primary"), file_source("primary")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_source_requires_path() {
        let mut config = AppConfig::default();
        let mut source = file_source("primary");
        source.path = None;
        config.sources = vec![source];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchyard.yaml");
        std::fs::write(
            &path,
            r#"
sanitizer:
  enabled: true
  fallback_status_code: 503
  fallback_body: "gateway misconfigured"
discovery:
  poll_interval_seconds: 10
sources:
  - name: primary
    kind: file
    path: /var/lib/switchyard/primary
  - name: registry
    kind: memory
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.sanitizer.enabled);
        assert_eq!(config.sanitizer.fallback_status_code, 503);
        assert_eq!(config.sanitizer.fallback_body, "gateway misconfigured");
        assert_eq!(config.discovery.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.discovery.max_attempts, 5);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].kind, SourceKind::Memory);
        assert_eq!(config.sources[1].refresh_seconds, 5);
    }
}
