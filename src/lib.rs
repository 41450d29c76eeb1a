//! # Switchyard
//!
//! Resilience and consistency layer for an Envoy-based API gateway control
//! plane. It sits between the resource sources and xDS transmission:
//!
//! ```text
//! SourceWatchers -> SnapshotAggregator -> Translator -> RouteReplacingSanitizer -> SnapshotCache
//!       ^
//!       '-------- DiscoveryPoller (writes auxiliary data back into a source)
//! ```
//!
//! ## Core Components
//!
//! - **Snapshot Aggregator**: merges independently paced sources into one
//!   debounced, hash-deduplicated snapshot stream
//! - **Discovery Poller**: keeps auxiliary resource data (e.g. function lists)
//!   in sync with a flaky external service, with backoff and CAS writes
//! - **Route-replacing sanitizer**: redirects invalid routes to a fallback
//!   cluster so one bad route cannot block a configuration push
//! - **Error report splitter**: recognizes route-level errors in reports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchyard::aggregator::SnapshotAggregator;
//! use switchyard::config::AppConfig;
//! use switchyard::domain::DynamicResource;
//! use switchyard::sources::{MemorySource, WatchOpts};
//!
//! # async fn demo() -> switchyard::Result<()> {
//! let config = AppConfig::from_env()?;
//! let mut aggregator = SnapshotAggregator::<DynamicResource>::new(&config.aggregator);
//! aggregator.register("memory", Arc::new(MemorySource::new("memory")))?;
//!
//! let mut watch = aggregator.watch("default", &WatchOpts::default()).await?;
//! while let Some(snapshot) = watch.snapshots.recv().await {
//!     println!("snapshot {:016x} with {} resources", snapshot.hash(), snapshot.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod errors;
pub mod hashing;
pub mod observability;
pub mod sources;
pub mod syncer;
pub mod validation;
pub mod xds;

// Re-export commonly used types and traits
pub use aggregator::{AggregatedSnapshot, SnapshotAggregator};
pub use config::AppConfig;
pub use errors::{Result, SwitchyardError};
pub use observability::init_logging;
pub use syncer::{Syncer, Translation, Translator};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "switchyard");
    }
}
