//! Candidate Envoy snapshot: four named resource collections with versions.

use std::collections::BTreeMap;

use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::endpoint::v3::ClusterLoadAssignment;
use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::{
    route, route_action::ClusterSpecifier, Route, RouteConfiguration,
};
use prost::Message;

use super::resources::{
    BuiltResource, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL, ROUTE_TYPE_URL,
};
use crate::errors::{Result, SwitchyardError};
use crate::hashing::{digest_hash, hash_hex};

/// One resource collection keyed by resource name.
#[derive(Debug, Clone, PartialEq)]
pub struct Resources<T> {
    pub version: String,
    pub items: BTreeMap<String, T>,
}

impl<T> Default for Resources<T> {
    fn default() -> Self {
        Self { version: String::new(), items: BTreeMap::new() }
    }
}

impl<T: Message + PartialEq> Resources<T> {
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into(), items: BTreeMap::new() }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert or replace by name. Returns true when the stored value changed.
    pub fn upsert(&mut self, name: impl Into<String>, item: T) -> bool {
        let name = name.into();
        if self.items.get(&name) == Some(&item) {
            return false;
        }
        self.items.insert(name, item);
        true
    }

    /// Version string derived from the collection contents.
    pub fn content_version(&self) -> String {
        let encoded: Vec<(Vec<u8>, Vec<u8>)> = self
            .items
            .iter()
            .map(|(name, item)| (name.as_bytes().to_vec(), item.encode_to_vec()))
            .collect();
        let chunks = encoded.iter().flat_map(|(name, body)| [name.as_slice(), body.as_slice()]);
        hash_hex(digest_hash(chunks))
    }

    /// Replace the version with one derived from the current contents.
    pub fn refresh_version(&mut self) {
        self.version = self.content_version();
    }

    fn built(&self, type_url: &str) -> Vec<BuiltResource> {
        self.items
            .iter()
            .map(|(name, item)| BuiltResource::from_message(name.clone(), type_url, item))
            .collect()
    }
}

/// A route pointing at a cluster, as found while walking route configurations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClusterReference {
    pub route_configuration: String,
    pub route: String,
    pub cluster: String,
}

/// The four xDS collections produced by one translation cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XdsSnapshot {
    pub endpoints: Resources<ClusterLoadAssignment>,
    pub clusters: Resources<Cluster>,
    pub routes: Resources<RouteConfiguration>,
    pub listeners: Resources<Listener>,
}

impl XdsSnapshot {
    /// Empty snapshot with every collection at `version`.
    pub fn new(version: &str) -> Self {
        Self {
            endpoints: Resources::new(version),
            clusters: Resources::new(version),
            routes: Resources::new(version),
            listeners: Resources::new(version),
        }
    }

    pub fn with_endpoints(mut self, assignment: ClusterLoadAssignment) -> Self {
        self.endpoints.items.insert(assignment.cluster_name.clone(), assignment);
        self
    }

    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.clusters.items.insert(cluster.name.clone(), cluster);
        self
    }

    pub fn with_route_configuration(mut self, route_configuration: RouteConfiguration) -> Self {
        self.routes.items.insert(route_configuration.name.clone(), route_configuration);
        self
    }

    pub fn with_listener(mut self, listener: Listener) -> Self {
        self.listeners.items.insert(listener.name.clone(), listener);
        self
    }

    /// Every cluster named by a route, in route configuration order.
    pub fn cluster_references(&self) -> Vec<ClusterReference> {
        let mut references = Vec::new();
        for (route_configuration, config) in &self.routes.items {
            for virtual_host in &config.virtual_hosts {
                for route in &virtual_host.routes {
                    for cluster in route_clusters(route) {
                        references.push(ClusterReference {
                            route_configuration: route_configuration.clone(),
                            route: route.name.clone(),
                            cluster: cluster.to_string(),
                        });
                    }
                }
            }
        }
        references
    }

    pub fn references_cluster(&self, cluster: &str) -> bool {
        self.cluster_references().iter().any(|reference| reference.cluster == cluster)
    }

    /// References to clusters missing from this snapshot.
    pub fn dangling_references(&self) -> Vec<ClusterReference> {
        self.cluster_references()
            .into_iter()
            .filter(|reference| !self.clusters.contains(&reference.cluster))
            .collect()
    }

    /// Fail if any route references a cluster absent from the snapshot.
    pub fn check_consistency(&self) -> Result<()> {
        let dangling = self.dangling_references();
        if dangling.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = dangling
            .iter()
            .map(|r| format!("{}/{} -> {}", r.route_configuration, r.route, r.cluster))
            .collect();
        Err(SwitchyardError::invariant(format!(
            "routes reference missing clusters: {}",
            listed.join(", ")
        )))
    }

    /// Encode every collection, keyed by type URL.
    pub fn built_resources(&self) -> Vec<(&'static str, Vec<BuiltResource>)> {
        vec![
            (CLUSTER_TYPE_URL, self.clusters.built(CLUSTER_TYPE_URL)),
            (ENDPOINT_TYPE_URL, self.endpoints.built(ENDPOINT_TYPE_URL)),
            (LISTENER_TYPE_URL, self.listeners.built(LISTENER_TYPE_URL)),
            (ROUTE_TYPE_URL, self.routes.built(ROUTE_TYPE_URL)),
        ]
    }
}

/// Cluster names a route forwards to.
///
/// Header- and plugin-selected clusters are resolved by Envoy per request and
/// cannot be checked here.
pub(crate) fn route_clusters(route: &Route) -> Vec<&str> {
    match route.action.as_ref() {
        Some(route::Action::Route(action)) => match action.cluster_specifier.as_ref() {
            Some(ClusterSpecifier::Cluster(cluster)) => vec![cluster.as_str()],
            Some(ClusterSpecifier::WeightedClusters(weighted)) => {
                weighted.clusters.iter().map(|entry| entry.name.as_str()).collect()
            }
            Some(ClusterSpecifier::ClusterHeader(_))
            | Some(ClusterSpecifier::ClusterSpecifierPlugin(_))
            | Some(ClusterSpecifier::InlineClusterSpecifierPlugin(_))
            | None => Vec::new(),
        },
        Some(route::Action::Redirect(_))
        | Some(route::Action::DirectResponse(_))
        | Some(route::Action::FilterAction(_))
        | Some(route::Action::NonForwardingAction(_))
        | None => Vec::new(),
    }
}

/// Mutable access to the cluster names a route forwards to.
pub(crate) fn route_clusters_mut(route: &mut Route) -> Vec<&mut String> {
    match route.action.as_mut() {
        Some(route::Action::Route(action)) => match action.cluster_specifier.as_mut() {
            Some(ClusterSpecifier::Cluster(cluster)) => vec![cluster],
            Some(ClusterSpecifier::WeightedClusters(weighted)) => {
                weighted.clusters.iter_mut().map(|entry| &mut entry.name).collect()
            }
            Some(ClusterSpecifier::ClusterHeader(_))
            | Some(ClusterSpecifier::ClusterSpecifierPlugin(_))
            | Some(ClusterSpecifier::InlineClusterSpecifierPlugin(_))
            | None => Vec::new(),
        },
        Some(route::Action::Redirect(_))
        | Some(route::Action::DirectResponse(_))
        | Some(route::Action::FilterAction(_))
        | Some(route::Action::NonForwardingAction(_))
        | None => Vec::new(),
    }
}
