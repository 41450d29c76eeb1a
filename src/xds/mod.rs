//! # xDS snapshot handling
//!
//! Envoy-facing half of the control plane: the candidate snapshot produced by
//! translation, the route-replacing sanitizer that repairs it, and the
//! per-node cache handing the result to the xDS transport.

pub mod fallback;
pub mod resources;
pub mod sanitizer;
pub mod snapshot;
pub mod state;

pub use fallback::FallbackResources;
pub use resources::{
    BuiltResource, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL, ROUTE_TYPE_URL,
};
pub use sanitizer::RouteReplacingSanitizer;
pub use snapshot::{ClusterReference, Resources, XdsSnapshot};
pub use state::{CachedResource, ResourceDelta, ResourceUpdate, SnapshotCache};
