use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use envoy_types::pb::google::protobuf::Any;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::resources::BuiltResource;
use super::snapshot::XdsSnapshot;
use crate::xds_span;

/// Capacity of the update broadcast channel
pub const UPDATE_CHANNEL_CAPACITY: usize = 128;

#[derive(Clone, Debug, PartialEq)]
pub struct CachedResource {
    pub name: String,
    pub type_url: String,
    pub version: u64,
    pub body: Any,
}

impl CachedResource {
    pub fn new(name: String, type_url: String, version: u64, body: Any) -> Self {
        Self { name, type_url, version, body }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceDelta {
    pub type_url: String,
    pub added_or_updated: Vec<CachedResource>,
    pub removed: Vec<String>,
}

/// Changes published for one node after a snapshot was applied.
#[derive(Clone, Debug)]
pub struct ResourceUpdate {
    pub node_id: String,
    pub version: u64,
    pub deltas: Vec<ResourceDelta>,
}

type TypeCache = HashMap<String, CachedResource>;

/// Per-node cache of sanitized snapshots, consumed by the xDS transport.
///
/// Every applied snapshot is diffed against what the node last received.
/// Only nodes with actual changes get a new version and a broadcast update.
#[derive(Debug)]
pub struct SnapshotCache {
    version: AtomicU64,
    nodes: RwLock<HashMap<String, HashMap<String, TypeCache>>>,
    update_tx: broadcast::Sender<Arc<ResourceUpdate>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self { version: AtomicU64::new(0), nodes: RwLock::new(HashMap::new()), update_tx }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Replace what `node_id` should receive with `snapshot`.
    /// Returns `Some(ResourceUpdate)` when a delta was published.
    pub fn set_snapshot(&self, node_id: &str, snapshot: &XdsSnapshot) -> Option<Arc<ResourceUpdate>> {
        let span = xds_span!("set_snapshot", node_id);
        let _guard = span.enter();

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let node = nodes.entry(node_id.to_string()).or_default();

        let pending: Vec<(String, Vec<BuiltResource>, Vec<String>)> = snapshot
            .built_resources()
            .into_iter()
            .filter_map(|(type_url, built)| {
                let cache = node.get(type_url);
                let (changed, removed) = diff(cache, built);
                if changed.is_empty() && removed.is_empty() {
                    None
                } else {
                    Some((type_url.to_string(), changed, removed))
                }
            })
            .collect();

        if pending.is_empty() {
            debug!("Snapshot unchanged for node");
            return None;
        }

        let new_version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        let mut deltas = Vec::with_capacity(pending.len());

        for (type_url, changed, removed) in pending {
            let cache = node.entry(type_url.clone()).or_default();
            for name in &removed {
                cache.remove(name);
            }

            let mut delta = ResourceDelta { type_url: type_url.clone(), added_or_updated: Vec::new(), removed };
            for built in changed {
                let cached =
                    CachedResource::new(built.name.clone(), type_url.clone(), new_version, built.resource);
                cache.insert(built.name, cached.clone());
                delta.added_or_updated.push(cached);
            }
            deltas.push(delta);
        }

        info!(version = new_version, types = deltas.len(), "Published snapshot update");
        let update = Arc::new(ResourceUpdate { node_id: node_id.to_string(), version: new_version, deltas });
        let _ = self.update_tx.send(update.clone());
        Some(update)
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<Arc<ResourceUpdate>> {
        self.update_tx.subscribe()
    }

    /// Return a clone of the cached resources for a node and type URL.
    pub fn cached_resources(&self, node_id: &str, type_url: &str) -> Vec<CachedResource> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut resources: Vec<CachedResource> = nodes
            .get(node_id)
            .and_then(|node| node.get(type_url))
            .map(|cache| cache.values().cloned().collect())
            .unwrap_or_default();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        resources
    }

    pub fn node_ids(&self) -> Vec<String> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Forget a node, e.g. after its stream closed for good.
    pub fn clear_node(&self, node_id: &str) -> bool {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner).remove(node_id).is_some()
    }
}

fn diff(cache: Option<&TypeCache>, built: Vec<BuiltResource>) -> (Vec<BuiltResource>, Vec<String>) {
    let incoming: HashSet<&str> = built.iter().map(|resource| resource.name.as_str()).collect();

    let mut removed: Vec<String> = cache
        .map(|cache| {
            cache.keys().filter(|existing| !incoming.contains(existing.as_str())).cloned().collect()
        })
        .unwrap_or_default();
    removed.sort();

    let changed = built
        .into_iter()
        .filter(|resource| match cache.and_then(|cache| cache.get(&resource.name)) {
            Some(existing) => existing.body != resource.resource,
            None => true,
        })
        .collect();

    (changed, removed)
}
