//! Translation-cycle driver.
//!
//! Each aggregated snapshot is translated into a candidate xDS snapshot,
//! sanitized and applied to the [`SnapshotCache`] for one node. A cycle that
//! fails leaves the node's previous configuration in place.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};

use crate::aggregator::AggregatedSnapshot;
use crate::domain::Resource;
use crate::errors::Result;
use crate::observability::MetricsRecorder;
use crate::validation::ResourceReports;
use crate::xds::{ResourceUpdate, RouteReplacingSanitizer, SnapshotCache, XdsSnapshot};
use crate::xds_span;

/// Output of one translation pass.
#[derive(Debug, Clone)]
pub struct Translation {
    pub snapshot: XdsSnapshot,
    /// Cluster names routes may legitimately point at.
    pub valid_destinations: HashSet<String>,
    pub reports: ResourceReports,
}

/// Turns domain resources into Envoy configuration.
pub trait Translator<R: Resource>: Send + Sync {
    fn translate(&self, snapshot: &AggregatedSnapshot<R>) -> Result<Translation>;
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub snapshot_hash: u64,
    /// `None` when the node already had identical configuration.
    pub update: Option<Arc<ResourceUpdate>>,
    /// Reports after sanitization; route errors that were neutralized are
    /// warnings here.
    pub reports: ResourceReports,
}

pub struct Syncer<T> {
    translator: T,
    sanitizer: RouteReplacingSanitizer,
    cache: Arc<SnapshotCache>,
    node_id: String,
    metrics: MetricsRecorder,
}

impl<T> Syncer<T> {
    pub fn new(
        translator: T,
        sanitizer: RouteReplacingSanitizer,
        cache: Arc<SnapshotCache>,
        node_id: impl Into<String>,
    ) -> Self {
        Self { translator, sanitizer, cache, node_id: node_id.into(), metrics: MetricsRecorder::new() }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Run one cycle for `snapshot`.
    pub fn sync<R: Resource>(&self, snapshot: &AggregatedSnapshot<R>) -> Result<SyncOutcome>
    where
        T: Translator<R>,
    {
        let Translation { snapshot: candidate, valid_destinations, mut reports } =
            self.translator.translate(snapshot)?;

        let sanitized = match self.sanitizer.sanitize(candidate, &valid_destinations, &mut reports) {
            Ok(sanitized) => sanitized,
            Err(err) => {
                self.metrics.record_sync_cycle(&self.node_id, false);
                return Err(err);
            }
        };

        for (proxy, report) in &reports {
            for warning in &report.warnings {
                warn!(proxy = %proxy, warning = %warning, "Translation warning");
            }
        }

        let update = self.cache.set_snapshot(&self.node_id, &sanitized);
        self.metrics.record_sync_cycle(&self.node_id, true);
        Ok(SyncOutcome { snapshot_hash: snapshot.hash(), update, reports })
    }

    /// Consume snapshots until the stream closes.
    ///
    /// Failed cycles are logged and skipped; the loop itself never fails.
    pub async fn run<R: Resource>(&self, mut snapshots: mpsc::Receiver<AggregatedSnapshot<R>>)
    where
        T: Translator<R>,
    {
        let span = xds_span!("sync", self.node_id);
        async {
            info!("Starting syncer");
            while let Some(snapshot) = snapshots.recv().await {
                match self.sync(&snapshot) {
                    Ok(outcome) => match &outcome.update {
                        Some(update) => info!(
                            snapshot_hash = outcome.snapshot_hash,
                            version = update.version,
                            "Applied translated snapshot"
                        ),
                        None => debug!(snapshot_hash = outcome.snapshot_hash, "Snapshot produced no changes"),
                    },
                    Err(err) => error!(
                        snapshot_hash = snapshot.hash(),
                        error = %err,
                        "Translation cycle rejected, keeping previous configuration"
                    ),
                }
            }
            info!("Snapshot stream closed, syncer stopped");
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SourceResources;
    use crate::config::SanitizerConfig;
    use crate::domain::{DynamicResource, ProxyId};
    use crate::errors::SwitchyardError;
    use crate::validation::{RouteError, ValidationReport};
    use crate::xds::fixtures::{cluster, route_configuration, single_route};
    use crate::xds::CLUSTER_TYPE_URL;
    use serde_json::json;

    /// `{"cluster": x}` specs become clusters; `{"route_to": x}` specs become
    /// routes; a `"broken"` field files a route error.
    struct SpecTranslator;

    impl Translator<DynamicResource> for SpecTranslator {
        fn translate(&self, snapshot: &AggregatedSnapshot<DynamicResource>) -> Result<Translation> {
            let mut xds = XdsSnapshot::new("1");
            let mut valid_destinations = HashSet::new();
            let mut routes = Vec::new();
            let mut report = ValidationReport::new();

            for resource in snapshot.merged() {
                if let Some(name) = resource.spec["cluster"].as_str() {
                    xds = xds.with_cluster(cluster(name));
                    valid_destinations.insert(name.to_string());
                }
                if let Some(target) = resource.spec["route_to"].as_str() {
                    routes.push(single_route(&resource.metadata.name, target));
                    if let Some(reason) = resource.spec["broken"].as_str() {
                        report.add_error(RouteError::new(reason, &resource.metadata.name));
                    }
                }
            }

            let mut reports = ResourceReports::new();
            reports.insert(ProxyId::new("ns1", "gateway-proxy"), report);
            Ok(Translation {
                snapshot: xds.with_route_configuration(route_configuration("rc1", routes)),
                valid_destinations,
                reports,
            })
        }
    }

    fn snapshot(specs: Vec<(&str, serde_json::Value)>) -> AggregatedSnapshot<DynamicResource> {
        let resources = specs
            .into_iter()
            .map(|(name, spec)| DynamicResource::new("ns1", name, spec))
            .collect();
        AggregatedSnapshot::new(vec![SourceResources { source: "file".into(), resources }]).unwrap()
    }

    fn syncer(enabled: bool) -> Syncer<SpecTranslator> {
        let config = SanitizerConfig { enabled, ..Default::default() };
        Syncer::new(
            SpecTranslator,
            RouteReplacingSanitizer::new(&config),
            Arc::new(SnapshotCache::new()),
            "gateway-proxy",
        )
    }

    #[test]
    fn broken_route_is_redirected_and_applied() {
        let syncer = syncer(true);
        let outcome = syncer
            .sync(&snapshot(vec![
                ("up", json!({"cluster": "petstore"})),
                ("r1", json!({"route_to": "petstore"})),
                ("r2", json!({"route_to": "petstore", "broken": "bad header"})),
                ("r3", json!({"route_to": "gone"})),
            ]))
            .unwrap();

        let update = outcome.update.expect("first cycle publishes");
        assert_eq!(update.node_id, "gateway-proxy");

        let report = outcome.reports.values().next().unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);

        let clusters: Vec<_> = syncer
            .cache()
            .cached_resources("gateway-proxy", CLUSTER_TYPE_URL)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(clusters, vec!["fallback_cluster_for_invalid_routes", "petstore"]);
    }

    #[test]
    fn identical_snapshot_publishes_nothing_new() {
        let syncer = syncer(true);
        let input = snapshot(vec![
            ("up", json!({"cluster": "petstore"})),
            ("r1", json!({"route_to": "petstore"})),
        ]);
        assert!(syncer.sync(&input).unwrap().update.is_some());
        assert!(syncer.sync(&input).unwrap().update.is_none());
    }

    #[test]
    fn strict_mode_rejection_keeps_previous_configuration() {
        let syncer = syncer(false);
        syncer
            .sync(&snapshot(vec![
                ("up", json!({"cluster": "petstore"})),
                ("r1", json!({"route_to": "petstore"})),
            ]))
            .unwrap();
        let version = syncer.cache().version();

        let err = syncer
            .sync(&snapshot(vec![
                ("up", json!({"cluster": "petstore"})),
                ("r1", json!({"route_to": "petstore", "broken": "bad header"})),
            ]))
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::Validation { .. }));
        assert_eq!(syncer.cache().version(), version);
    }

    #[tokio::test]
    async fn run_survives_rejected_cycles() {
        let syncer = Arc::new(syncer(false));
        let (tx, rx) = mpsc::channel(4);
        let mut updates = syncer.cache().subscribe_updates();

        let task = tokio::spawn({
            let syncer = syncer.clone();
            async move { syncer.run(rx).await }
        });

        tx.send(snapshot(vec![("r1", json!({"route_to": "gone"}))])).await.unwrap();
        tx.send(snapshot(vec![
            ("up", json!({"cluster": "petstore"})),
            ("r1", json!({"route_to": "petstore"})),
        ]))
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let update = updates.recv().await.unwrap();
        assert_eq!(update.version, 1);
        assert!(updates.try_recv().is_err());
    }
}
