//! Fan-in of several differently paced sources into one debounced stream.
//!
//! ```text
//!  source A ──watch──▶ drain A ─┐
//!  source B ──watch──▶ drain B ─┼─▶ (idx, list) ─▶ coordinator ─try_send─▶ snapshots (cap 1)
//!  source C ──watch──▶ drain C ─┘                      │
//!        └────errors──▶ error drains ──────────────────┴──────────────────▶ errors
//! ```
//!
//! The coordinator task is the only owner of the merged state. On each tick
//! it emits if the state changed since the last *successful* emission. A full
//! output slot skips this tick without losing the change: the state stays
//! dirty and is retried on the next tick.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::snapshot::{state_hash, AggregatedSnapshot, SourceError, SourceResources};
use crate::aggregator_span;
use crate::config::AggregatorConfig;
use crate::domain::{Resource, SourceName};
use crate::errors::{Result, SwitchyardError};
use crate::observability::MetricsRecorder;
use crate::sources::{SourceWatch, SourceWatcher, WatchOpts, SOURCE_CHANNEL_CAPACITY};

/// Capacity of the tagged error output channel
pub const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Streams returned by [`SnapshotAggregator::watch`].
#[derive(Debug)]
pub struct AggregatorWatch<R> {
    /// Deduplicated merged snapshots. Closes first on shutdown.
    pub snapshots: mpsc::Receiver<AggregatedSnapshot<R>>,
    /// Per-source errors. Closes once every drain task has exited.
    pub errors: mpsc::Receiver<SourceError>,
    /// Completes when the coordinator and all drain tasks have exited.
    pub done: JoinHandle<()>,
}

struct RegisteredSource<R> {
    name: SourceName,
    watcher: Arc<dyn SourceWatcher<R>>,
}

/// Merges resource lists from N sources into one stream of snapshots.
pub struct SnapshotAggregator<R> {
    sources: Vec<RegisteredSource<R>>,
    debounce: Duration,
    metrics: MetricsRecorder,
}

impl<R: Resource> SnapshotAggregator<R> {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self { sources: Vec::new(), debounce: config.debounce(), metrics: MetricsRecorder::new() }
    }

    /// Register a source. Registration order is merge order.
    pub fn register(
        &mut self,
        name: impl Into<SourceName>,
        watcher: Arc<dyn SourceWatcher<R>>,
    ) -> Result<()> {
        let name = name.into();
        if self.sources.iter().any(|source| source.name == name) {
            return Err(SwitchyardError::config(format!("Source '{}' registered twice", name)));
        }
        self.sources.push(RegisteredSource { name, watcher });
        Ok(())
    }

    pub fn source_names(&self) -> Vec<SourceName> {
        self.sources.iter().map(|source| source.name.clone()).collect()
    }

    /// Start watching every source.
    ///
    /// Performs a blocking initial `list` against each source first; any
    /// failure aborts the call. After that, source errors are forwarded on
    /// the error stream and never stop the aggregator. `opts.cancel` is the
    /// shutdown signal for every task started here.
    pub async fn watch(&self, namespace: &str, opts: &WatchOpts) -> Result<AggregatorWatch<R>> {
        let mut state = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let resources = source
                .watcher
                .list(namespace, opts)
                .await
                .map_err(|e| SwitchyardError::source(source.name.as_str(), e.to_string()))?;
            state.push(SourceResources { source: source.name.clone(), resources });
        }

        let cancel = opts.cancel.child_token();
        let source_opts = WatchOpts { cancel: cancel.clone(), selector: opts.selector.clone() };

        let mut watches = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.watcher.watch(namespace, &source_opts).await {
                Ok(watch) => watches.push(watch),
                Err(e) => {
                    cancel.cancel();
                    return Err(SwitchyardError::source(source.name.as_str(), e.to_string()));
                }
            }
        }

        let capacity = (self.sources.len() * SOURCE_CHANNEL_CAPACITY).max(1);
        let (update_tx, update_rx) = mpsc::channel::<(usize, Vec<R>)>(capacity);
        let (error_tx, errors) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshots) = mpsc::channel(1);

        let mut drains = Vec::with_capacity(watches.len() * 2);
        for (index, watch) in watches.into_iter().enumerate() {
            let name = self.sources[index].name.clone();
            let SourceWatch { updates, errors } = watch;
            drains.push(tokio::spawn(drain_updates(
                index,
                updates,
                update_tx.clone(),
                cancel.clone(),
            )));
            drains.push(tokio::spawn(drain_errors(
                name,
                errors,
                error_tx.clone(),
                cancel.clone(),
                self.metrics.clone(),
            )));
        }
        drop(update_tx);

        let coordinator = Coordinator {
            namespace: namespace.to_string(),
            state,
            debounce: self.debounce,
            metrics: self.metrics.clone(),
        };
        let span = aggregator_span!(namespace, sources = self.sources.len());
        let done = tokio::spawn(
            coordinator.run(update_rx, snapshot_tx, error_tx, drains, cancel).instrument(span),
        );

        Ok(AggregatorWatch { snapshots, errors, done })
    }
}

async fn drain_updates<R: Resource>(
    index: usize,
    mut updates: mpsc::Receiver<Vec<R>>,
    update_tx: mpsc::Sender<(usize, Vec<R>)>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = updates.recv() => next,
        };
        let Some(resources) = next else { break };
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = update_tx.send((index, resources)) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

async fn drain_errors(
    source_name: SourceName,
    mut errors: mpsc::Receiver<SwitchyardError>,
    error_tx: mpsc::Sender<SourceError>,
    cancel: CancellationToken,
    metrics: MetricsRecorder,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = errors.recv() => next,
        };
        let Some(error) = next else { break };

        warn!(source = %source_name, error = %error, "Source reported an error");
        metrics.record_source_error(source_name.as_str());

        let tagged = SourceError { source_name: source_name.clone(), error };
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = error_tx.send(tagged) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

struct Coordinator<R> {
    namespace: String,
    state: Vec<SourceResources<R>>,
    debounce: Duration,
    metrics: MetricsRecorder,
}

impl<R: Resource> Coordinator<R> {
    async fn run(
        mut self,
        mut update_rx: mpsc::Receiver<(usize, Vec<R>)>,
        snapshot_tx: mpsc::Sender<AggregatedSnapshot<R>>,
        error_tx: mpsc::Sender<SourceError>,
        drains: Vec<JoinHandle<()>>,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(self.debounce);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The initial listing counts as a change so consumers get a first snapshot.
        let mut dirty = true;
        let mut last_emitted: Option<u64> = None;

        loop {
            // Unbiased so sustained update traffic cannot starve the ticker.
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some((index, resources)) = update_rx.recv() => {
                    debug!(
                        source = %self.state[index].source,
                        count = resources.len(),
                        "Received source update"
                    );
                    self.state[index].resources = resources;
                    dirty = true;
                }
                _ = ticker.tick() => {
                    if !dirty {
                        continue;
                    }
                    match self.try_emit(&snapshot_tx, last_emitted) {
                        Emission::Sent(hash) | Emission::Unchanged(hash) => {
                            last_emitted = Some(hash);
                            dirty = false;
                        }
                        Emission::Deferred => {}
                        Emission::ConsumerGone => {
                            debug!(namespace = %self.namespace, "Snapshot consumer went away");
                            cancel.cancel();
                            break;
                        }
                    }
                }
            }
        }

        // Close the output first, then wait for every drain before closing errors.
        drop(snapshot_tx);
        drop(update_rx);
        for joined in join_all(drains).await {
            if let Err(error) = joined {
                warn!(error = %error, "Drain task failed");
            }
        }
        drop(error_tx);
        info!(namespace = %self.namespace, "Aggregator watch stopped");
    }

    fn try_emit(
        &self,
        snapshot_tx: &mpsc::Sender<AggregatedSnapshot<R>>,
        last_emitted: Option<u64>,
    ) -> Emission {
        let hash = match state_hash(&self.state) {
            Ok(hash) => hash,
            Err(error) => {
                warn!(error = %error, "Could not hash aggregated state, retrying next tick");
                return Emission::Deferred;
            }
        };
        if last_emitted == Some(hash) {
            return Emission::Unchanged(hash);
        }

        let snapshot = AggregatedSnapshot::from_parts(self.state.clone(), hash);
        let count = snapshot.len();
        match snapshot_tx.try_send(snapshot) {
            Ok(()) => {
                debug!(hash = %format!("{:016x}", hash), resources = count, "Emitted merged snapshot");
                self.metrics.record_snapshot_emitted(&self.namespace, count);
                Emission::Sent(hash)
            }
            Err(TrySendError::Full(_)) => {
                debug!(
                    hash = %format!("{:016x}", hash),
                    "Snapshot consumer not ready, deferring emission to next tick"
                );
                self.metrics.record_snapshot_skipped(&self.namespace);
                Emission::Deferred
            }
            Err(TrySendError::Closed(_)) => Emission::ConsumerGone,
        }
    }
}

enum Emission {
    Sent(u64),
    Unchanged(u64),
    Deferred,
    ConsumerGone,
}
