//! Resource sources
//!
//! A source wraps one external backend behind a uniform interface: an initial
//! `list`, then a `watch` yielding a stream of full resource lists and a
//! parallel stream of errors. Sources are registered with the
//! [`SnapshotAggregator`](crate::aggregator::SnapshotAggregator) under a
//! stable [`SourceName`](crate::domain::SourceName).
//!
//! ## Implementations
//!
//! - [`MemorySource`]: in-memory store, also a compare-and-swap [`ResourceStore`]
//! - [`PollingSource`]: re-lists any [`ResourceLister`] on a refresh interval
//! - [`FileSource`]: a directory of YAML/JSON resource files

pub mod file;
pub mod memory;
pub mod polling;
pub mod store;

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::Resource;
use crate::errors::{Result, SwitchyardError};

pub use file::FileSource;
pub use memory::MemorySource;
pub use polling::{PollingSource, ResourceLister};
pub use store::ResourceStore;

/// Capacity of the per-source update and error channels
pub const SOURCE_CHANNEL_CAPACITY: usize = 16;

/// Options shared by `list` and `watch`.
#[derive(Debug, Clone, Default)]
pub struct WatchOpts {
    /// Stops the watch and every task it spawned
    pub cancel: CancellationToken,
    /// Label selector; empty selects everything
    pub selector: BTreeMap<String, String>,
}

impl WatchOpts {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel, selector: BTreeMap::new() }
    }

    pub fn with_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selector.insert(key.into(), value.into());
        self
    }

    /// Copy of these options bound to a child token
    pub fn child(&self) -> Self {
        Self { cancel: self.cancel.child_token(), selector: self.selector.clone() }
    }
}

/// Streams returned by [`SourceWatcher::watch`]. Both close when the watch
/// ends, either through cancellation or because the backend went away.
#[derive(Debug)]
pub struct SourceWatch<R> {
    pub updates: mpsc::Receiver<Vec<R>>,
    pub errors: mpsc::Receiver<SwitchyardError>,
}

/// Uniform interface over one external resource backend.
///
/// An empty `namespace` means all namespaces.
#[async_trait]
pub trait SourceWatcher<R: Resource>: Send + Sync {
    async fn list(&self, namespace: &str, opts: &WatchOpts) -> Result<Vec<R>>;

    async fn watch(&self, namespace: &str, opts: &WatchOpts) -> Result<SourceWatch<R>>;
}

/// Keep resources in `namespace` (or all, when empty) matching the selector.
pub(crate) fn select<R: Resource>(resources: Vec<R>, namespace: &str, opts: &WatchOpts) -> Vec<R> {
    resources
        .into_iter()
        .filter(|r| namespace.is_empty() || r.metadata().namespace == namespace)
        .filter(|r| r.metadata().matches(&opts.selector))
        .collect()
}
