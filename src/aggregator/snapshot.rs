//! Merged view over every registered source.

use serde::Serialize;

use crate::domain::{Resource, SourceName};
use crate::errors::{Result, SwitchyardError};
use crate::hashing::content_hash;

/// Resources last reported by one source, in the order the source gave them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceResources<R> {
    pub source: SourceName,
    pub resources: Vec<R>,
}

/// Read-only copy of the aggregator state handed to consumers.
///
/// Sources appear in registration order. Resources are not deduplicated
/// across sources: two sources reporting the same `(namespace, name)` both
/// contribute a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSnapshot<R> {
    sources: Vec<SourceResources<R>>,
    hash: u64,
}

impl<R: Resource> AggregatedSnapshot<R> {
    pub fn new(sources: Vec<SourceResources<R>>) -> Result<Self> {
        let hash = state_hash(&sources)?;
        Ok(Self { sources, hash })
    }

    pub(crate) fn from_parts(sources: Vec<SourceResources<R>>, hash: u64) -> Self {
        Self { sources, hash }
    }

    /// Content hash covering every source's contents
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn sources(&self) -> &[SourceResources<R>] {
        &self.sources
    }

    pub fn resources_for(&self, source: &str) -> Option<&[R]> {
        self.sources
            .iter()
            .find(|entry| entry.source.as_str() == source)
            .map(|entry| entry.resources.as_slice())
    }

    /// Flattened list: each source's resources in source order, sources in
    /// registration order.
    pub fn merged(&self) -> Vec<R> {
        self.sources.iter().flat_map(|entry| entry.resources.iter().cloned()).collect()
    }

    pub fn into_merged(self) -> Vec<R> {
        self.sources.into_iter().flat_map(|entry| entry.resources).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.iter().map(|entry| entry.resources.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn state_hash<R: Resource>(sources: &[SourceResources<R>]) -> Result<u64> {
    content_hash(sources).map_err(|e| SwitchyardError::internal(format!("hash aggregated state: {}", e)))
}

/// An error reported by one source, tagged with that source's name.
#[derive(Debug, thiserror::Error)]
#[error("source '{source_name}': {error}")]
pub struct SourceError {
    pub source_name: SourceName,
    #[source]
    pub error: SwitchyardError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DynamicResource;
    use serde_json::json;

    fn entry(source: &str, names: &[&str]) -> SourceResources<DynamicResource> {
        SourceResources {
            source: SourceName::from(source),
            resources: names.iter().map(|n| DynamicResource::new("ns1", n, json!({}))).collect(),
        }
    }

    #[test]
    fn test_merged_keeps_registration_then_source_order() {
        let snapshot =
            AggregatedSnapshot::new(vec![entry("gloo", &["z", "a"]), entry("kube", &["m"])]).unwrap();
        let names: Vec<_> = snapshot.merged().into_iter().map(|r| r.metadata.name).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.resources_for("kube").unwrap().len(), 1);
        assert!(snapshot.resources_for("consul").is_none());
    }

    #[test]
    fn test_hash_distinguishes_which_source_owns_a_resource() {
        let a = AggregatedSnapshot::new(vec![entry("gloo", &["r1"]), entry("kube", &[])]).unwrap();
        let b = AggregatedSnapshot::new(vec![entry("gloo", &[]), entry("kube", &["r1"])]).unwrap();
        assert_ne!(a.hash(), b.hash());
    }
}
