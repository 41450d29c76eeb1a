//! # Snapshot Aggregator
//!
//! Merges the resource lists of several independently paced sources into one
//! debounced, deduplicated stream of [`AggregatedSnapshot`]s.
//!
//! Guarantees:
//! - two consecutively emitted snapshots never share a content hash
//! - a change is never lost because the consumer was slow; it is emitted on a
//!   later tick once the consumer has taken the previous snapshot
//! - each source's contribution keeps the order the source reported
//! - after cancellation the snapshot stream closes, then every drain task
//!   exits, then the error stream closes

mod multi_source;
mod snapshot;

pub use multi_source::{AggregatorWatch, SnapshotAggregator, ERROR_CHANNEL_CAPACITY};
pub use snapshot::{AggregatedSnapshot, SourceError, SourceResources};
