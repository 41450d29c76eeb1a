//! In-memory resource source.
//!
//! Holds resources in a map and wakes watchers on every change. It doubles as
//! a [`ResourceStore`] so writers (the discovery poller, tests) mutate the same
//! data the aggregator watches.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::{select, ResourceStore, SourceWatch, SourceWatcher, WatchOpts, SOURCE_CHANNEL_CAPACITY};
use crate::domain::{Resource, ResourceRef};
use crate::errors::{Result, SwitchyardError};

#[derive(Debug)]
struct Inner<R> {
    name: String,
    resources: RwLock<BTreeMap<ResourceRef, R>>,
    generation: watch::Sender<u64>,
}

/// Shared in-memory store. Clones share the same data.
#[derive(Debug)]
pub struct MemorySource<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for MemorySource<R> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<R: Resource> MemorySource<R> {
    pub fn new(name: impl Into<String>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                resources: RwLock::new(BTreeMap::new()),
                generation,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Unconditionally insert or replace a resource, bumping its version.
    pub fn upsert(&self, mut resource: R) -> R {
        let id = resource.resource_ref();
        {
            let mut resources =
                self.inner.resources.write().unwrap_or_else(PoisonError::into_inner);
            let next_version =
                resources.get(&id).map(|r| r.metadata().resource_version).unwrap_or(0) + 1;
            resource.metadata_mut().resource_version = next_version;
            resources.insert(id, resource.clone());
        }
        self.notify();
        resource
    }

    pub fn delete(&self, id: &ResourceRef) -> Option<R> {
        let removed = self
            .inner
            .resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// All resources ordered by identity
    pub fn snapshot(&self) -> Vec<R> {
        self.inner
            .resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn notify(&self) {
        self.inner.generation.send_modify(|generation| *generation += 1);
    }
}

#[async_trait]
impl<R: Resource> SourceWatcher<R> for MemorySource<R> {
    async fn list(&self, namespace: &str, opts: &WatchOpts) -> Result<Vec<R>> {
        Ok(select(self.snapshot(), namespace, opts))
    }

    async fn watch(&self, namespace: &str, opts: &WatchOpts) -> Result<SourceWatch<R>> {
        let (update_tx, updates) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
        // Memory sources never fail; the sender only lives to keep the stream open.
        let (error_tx, errors) = mpsc::channel::<SwitchyardError>(SOURCE_CHANNEL_CAPACITY);

        let source = self.clone();
        let namespace = namespace.to_string();
        let opts = opts.clone();
        let mut generation = self.inner.generation.subscribe();

        tokio::spawn(async move {
            let _error_tx = error_tx;
            loop {
                let current = select(source.snapshot(), &namespace, &opts);
                tokio::select! {
                    _ = opts.cancel.cancelled() => break,
                    sent = update_tx.send(current) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }

                tokio::select! {
                    _ = opts.cancel.cancelled() => break,
                    _ = update_tx.closed() => break,
                    changed = generation.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(source = %source.name(), namespace = %namespace, "Memory source watch stopped");
        });

        Ok(SourceWatch { updates, errors })
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for MemorySource<R> {
    async fn read(&self, id: &ResourceRef) -> Result<Option<R>> {
        Ok(self
            .inner
            .resources
            .read()
            .map_err(|_| SwitchyardError::internal("memory source lock poisoned"))?
            .get(id)
            .cloned())
    }

    async fn write(&self, mut resource: R) -> Result<R> {
        let id = resource.resource_ref();
        let expected = resource.metadata().resource_version;
        {
            let mut resources = self
                .inner
                .resources
                .write()
                .map_err(|_| SwitchyardError::internal("memory source lock poisoned"))?;

            match resources.get(&id).map(|r| r.metadata().resource_version) {
                Some(actual) if actual != expected => {
                    return Err(SwitchyardError::conflict(id.to_string(), expected, actual));
                }
                None if expected != 0 => {
                    return Err(SwitchyardError::not_found("resource", id.to_string()));
                }
                _ => {}
            }

            resource.metadata_mut().resource_version = expected + 1;
            resources.insert(id, resource.clone());
        }
        self.notify();
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DynamicResource;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn resource(ns: &str, name: &str, port: u16) -> DynamicResource {
        DynamicResource::new(ns, name, json!({ "port": port }))
    }

    #[tokio::test]
    async fn upsert_bumps_version_and_lists_in_identity_order() {
        let source = MemorySource::new("primary");
        source.upsert(resource("ns1", "b", 80));
        source.upsert(resource("ns1", "a", 80));
        let updated = source.upsert(resource("ns1", "b", 81));
        assert_eq!(updated.metadata.resource_version, 2);

        let listed = source.list("ns1", &WatchOpts::default()).await.unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn write_rejects_stale_version() {
        let source = MemorySource::new("primary");
        let stored = source.upsert(resource("ns1", "a", 80));

        let mut first = stored.clone();
        first.spec = json!({ "port": 81 });
        let written = source.write(first).await.unwrap();
        assert_eq!(written.metadata.resource_version, stored.metadata.resource_version + 1);

        let mut stale = stored;
        stale.spec = json!({ "port": 82 });
        let err = source.write(stale).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::Conflict { .. }));
    }

    #[tokio::test]
    async fn write_to_deleted_resource_is_not_found() {
        let source = MemorySource::new("primary");
        let stored = source.upsert(resource("ns1", "a", 80));
        source.delete(&stored.resource_ref());

        let err = source.write(stored).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::NotFound { .. }));
    }

    #[tokio::test]
    async fn watch_emits_current_state_then_changes() {
        let source = MemorySource::new("primary");
        source.upsert(resource("ns1", "a", 80));
        let cancel = CancellationToken::new();
        let mut watch = source.watch("ns1", &WatchOpts::new(cancel.clone())).await.unwrap();

        let initial = watch.updates.recv().await.unwrap();
        assert_eq!(initial.len(), 1);

        source.upsert(resource("ns1", "b", 80));
        let next = tokio::time::timeout(Duration::from_secs(1), watch.updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.len(), 2);

        cancel.cancel();
        assert!(watch.updates.recv().await.is_none());
        assert!(watch.errors.recv().await.is_none());
    }
}
