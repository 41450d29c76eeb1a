//! Polling source adapter.
//!
//! Turns any backend that can only be listed into a watchable source by
//! re-listing on a fixed refresh interval and emitting only when the listed
//! content actually changed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::{select, SourceWatch, SourceWatcher, WatchOpts, SOURCE_CHANNEL_CAPACITY};
use crate::domain::Resource;
use crate::errors::{Result, SwitchyardError};
use crate::hashing::content_hash;

/// A backend that can list its resources on demand.
#[async_trait]
pub trait ResourceLister<R: Resource>: Send + Sync + 'static {
    async fn list_resources(&self, namespace: &str) -> Result<Vec<R>>;
}

/// Watchable wrapper over a [`ResourceLister`].
#[derive(Debug)]
pub struct PollingSource<L> {
    name: String,
    lister: Arc<L>,
    refresh: Duration,
}

impl<L> Clone for PollingSource<L> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), lister: Arc::clone(&self.lister), refresh: self.refresh }
    }
}

impl<L> PollingSource<L> {
    pub fn new(name: impl Into<String>, lister: L, refresh: Duration) -> Self {
        Self { name: name.into(), lister: Arc::new(lister), refresh }
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }
}

#[async_trait]
impl<R, L> SourceWatcher<R> for PollingSource<L>
where
    R: Resource,
    L: ResourceLister<R>,
{
    async fn list(&self, namespace: &str, opts: &WatchOpts) -> Result<Vec<R>> {
        let listed = self.lister.list_resources(namespace).await?;
        Ok(select(listed, namespace, opts))
    }

    async fn watch(&self, namespace: &str, opts: &WatchOpts) -> Result<SourceWatch<R>> {
        let (update_tx, updates) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
        let (error_tx, errors) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);

        let source = self.clone();
        let namespace = namespace.to_string();
        let opts = opts.clone();

        tokio::spawn(async move {
            let mut ticker = interval(source.refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_hash: Option<u64> = None;

            loop {
                tokio::select! {
                    _ = opts.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let listed = match SourceWatcher::<R>::list(&source, &namespace, &opts).await {
                    Ok(listed) => listed,
                    Err(error) => {
                        warn!(source = %source.name, error = %error, "Polling source list failed");
                        // Errors are advisory; drop them if the consumer is behind.
                        if let Err(mpsc::error::TrySendError::Closed(_)) = error_tx.try_send(error) {
                            break;
                        }
                        continue;
                    }
                };

                let hash = match content_hash(&listed) {
                    Ok(hash) => hash,
                    Err(error) => {
                        warn!(source = %source.name, error = %error, "Polling source hashing failed");
                        let _ = error_tx.try_send(SwitchyardError::source(
                            source.name.clone(),
                            error.to_string(),
                        ));
                        continue;
                    }
                };
                if last_hash == Some(hash) {
                    continue;
                }

                tokio::select! {
                    _ = opts.cancel.cancelled() => break,
                    sent = update_tx.send(listed) => {
                        if sent.is_err() {
                            break;
                        }
                        last_hash = Some(hash);
                    }
                }
            }
            debug!(source = %source.name, namespace = %namespace, "Polling source watch stopped");
        });

        Ok(SourceWatch { updates, errors })
    }
}
