//! Resource model shared by sources, the aggregator and the discovery poller.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use super::id::ResourceRef;

/// Object metadata carried by every domain resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub namespace: String,
    /// Storage version used for compare-and-swap writes
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            resource_version: 0,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.namespace.clone(), self.name.clone())
    }

    /// True when every selector entry is present in the labels
    pub fn matches(&self, selector: &BTreeMap<String, String>) -> bool {
        selector.iter().all(|(k, v)| self.labels.get(k) == Some(v))
    }
}

/// An opaque domain object identified by `(namespace, name)`.
///
/// The payload is irrelevant to the aggregator; it only needs to serialize
/// deterministically so content hashing is stable.
pub trait Resource: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn metadata(&self) -> &Metadata;

    fn metadata_mut(&mut self) -> &mut Metadata;

    fn resource_ref(&self) -> ResourceRef {
        self.metadata().resource_ref()
    }
}

/// Schema-less resource: metadata plus an arbitrary JSON spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicResource {
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl DynamicResource {
    pub fn new(namespace: &str, name: &str, spec: serde_json::Value) -> Self {
        Self { metadata: Metadata::new(namespace, name), spec }
    }
}

impl Resource for DynamicResource {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
