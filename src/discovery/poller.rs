//! Keeps one auxiliary property of one target resource fresh.
//!
//! Each cycle reads the target, fetches auxiliary data from a possibly slow or
//! flaky service, sorts it on a stable key, lets the mutator install it on a
//! copy of the target and writes the copy back with compare-and-swap. Failed
//! attempts are retried with backoff. Only cancellation stops the loop.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use crate::config::DiscoveryConfig;
use crate::domain::{Resource, ResourceRef};
use crate::errors::{Result, SwitchyardError};
use crate::hashing::content_hash;
use crate::observability::MetricsRecorder;
use crate::sources::ResourceStore;

/// External service providing the auxiliary data for a target.
#[async_trait]
pub trait DiscoverySource<R: Resource>: Send + Sync {
    type Item: Send + Sync + 'static;

    async fn fetch(&self, target: &R) -> Result<Vec<Self::Item>>;

    /// Stable key giving a total order over fetched items.
    fn sort_key(item: &Self::Item) -> &str;
}

/// Installs fetched items on the live target.
///
/// Must return an error, not panic, when the target no longer has the shape
/// it expects: it may have been edited between read and write.
pub type Mutator<R, T> = Box<dyn Fn(&mut R, Vec<T>) -> Result<()> + Send + Sync>;

pub struct DiscoveryPoller<R: Resource, D: DiscoverySource<R>> {
    target: ResourceRef,
    store: Arc<dyn ResourceStore<R>>,
    source: D,
    mutator: Mutator<R, D::Item>,
    poll_interval: Duration,
    backoff: Backoff,
    max_attempts: u32,
    metrics: MetricsRecorder,
}

impl<R: Resource, D: DiscoverySource<R>> DiscoveryPoller<R, D> {
    pub fn new(
        target: ResourceRef,
        store: Arc<dyn ResourceStore<R>>,
        source: D,
        mutator: Mutator<R, D::Item>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            target,
            store,
            source,
            mutator,
            poll_interval: config.poll_interval(),
            backoff: Backoff::from_config(config),
            max_attempts: config.max_attempts.max(1),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn target(&self) -> &ResourceRef {
        &self.target
    }

    /// Poll until `cancel` fires, then return [`SwitchyardError::Cancelled`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(resource = %self.target, interval_secs = self.poll_interval.as_secs(), "Starting discovery poller");
        let mut backoff = self.backoff.clone();

        loop {
            self.poll_cycle(&mut backoff, &cancel).await?;

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(resource = %self.target, "Discovery poller stopped");
                    return Err(SwitchyardError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Up to `max_attempts` backoff-separated attempts. Exhaustion is not an
    /// error; the next cycle starts over.
    async fn poll_cycle(&self, backoff: &mut Backoff, cancel: &CancellationToken) -> Result<()> {
        let target = self.target.to_string();

        for attempt in 1..=self.max_attempts {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(SwitchyardError::Cancelled),
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                Ok(written) => {
                    self.metrics.record_discovery_attempt(&target, true);
                    backoff.reset();
                    debug!(resource = %target, attempt, written, "Discovery attempt succeeded");
                    return Ok(());
                }
                Err(error) => {
                    self.metrics.record_discovery_attempt(&target, false);
                    if attempt == self.max_attempts {
                        warn!(
                            resource = %target,
                            attempt,
                            error = %error,
                            "Discovery retries exhausted, waiting for next poll"
                        );
                        return Ok(());
                    }

                    let delay = backoff.next_delay();
                    debug!(
                        resource = %target,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Discovery attempt failed, will retry"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SwitchyardError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// One unit of work. Returns whether the target was rewritten.
    pub async fn poll_once(&self) -> Result<bool> {
        let current = self
            .store
            .read(&self.target)
            .await?
            .ok_or_else(|| SwitchyardError::not_found("discovery target", self.target.to_string()))?;

        let mut items = self.source.fetch(&current).await?;
        items.sort_by(|a, b| D::sort_key(a).cmp(D::sort_key(b)));

        let mut updated = current.clone();
        (self.mutator)(&mut updated, items)?;

        if content_hash(&updated)? == content_hash(&current)? {
            return Ok(false);
        }
        self.store.write(updated).await?;
        Ok(true)
    }
}
