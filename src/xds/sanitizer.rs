//! Route-replacing sanitizer.
//!
//! Runs once per translation cycle between translation and transmission.
//! When enabled, routes that point at a destination outside the valid set, or
//! whose name appears in a route-level report error, are redirected to the
//! fallback cluster so one bad route cannot block the whole configuration
//! push. When disabled, every warning is promoted to an error and any error
//! rejects the cycle.

use std::collections::{BTreeSet, HashSet};

use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use tracing::{debug, info, warn};

use super::fallback::FallbackResources;
use super::snapshot::{route_clusters_mut, XdsSnapshot};
use crate::config::SanitizerConfig;
use crate::errors::Result;
use crate::observability::MetricsRecorder;
use crate::validation::{ensure_no_errors, split_route_errors, ResourceReports, ROUTE_ERROR_MARKER};

#[derive(Debug, Clone)]
pub struct RouteReplacingSanitizer {
    enabled: bool,
    fallback: FallbackResources,
    metrics: MetricsRecorder,
}

impl RouteReplacingSanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            enabled: config.enabled,
            fallback: FallbackResources::new(config),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fallback(&self) -> &FallbackResources {
        &self.fallback
    }

    /// Sanitize one candidate snapshot.
    ///
    /// `reports` is updated in place: recognized route errors become warnings
    /// (enabled), or warnings become errors (disabled). The returned snapshot
    /// always passes [`XdsSnapshot::check_consistency`].
    pub fn sanitize(
        &self,
        candidate: XdsSnapshot,
        valid_destinations: &HashSet<String>,
        reports: &mut ResourceReports,
    ) -> Result<XdsSnapshot> {
        if !self.enabled {
            return self.enforce_strict(candidate, reports);
        }

        let errored_routes = classify_reports(reports);
        let mut snapshot = candidate;

        let mut any_replaced = false;
        for (name, route_configuration) in snapshot.routes.items.iter_mut() {
            let replaced =
                self.rewrite_routes(route_configuration, valid_destinations, &errored_routes);
            self.metrics.record_routes_replaced(name, replaced);
            if replaced > 0 {
                any_replaced = true;
                warn!(
                    route_configuration = %name,
                    replaced,
                    fallback_cluster = %self.fallback.cluster_name(),
                    "Redirected invalid routes to the fallback cluster"
                );
            }
        }
        if any_replaced {
            snapshot.routes.refresh_version();
        }

        // Also covers a second pass over already-sanitized output.
        if snapshot.references_cluster(self.fallback.cluster_name()) {
            self.inject_fallback(&mut snapshot);
        }
        self.metrics.record_sanitize_outcome(any_replaced);

        snapshot.check_consistency()?;
        Ok(snapshot)
    }

    fn enforce_strict(
        &self,
        candidate: XdsSnapshot,
        reports: &mut ResourceReports,
    ) -> Result<XdsSnapshot> {
        for report in reports.values_mut() {
            report.promote_warnings();
        }
        ensure_no_errors(reports)?;
        candidate.check_consistency()?;
        Ok(candidate)
    }

    /// Returns how many cluster references were redirected.
    fn rewrite_routes(
        &self,
        route_configuration: &mut RouteConfiguration,
        valid_destinations: &HashSet<String>,
        errored_routes: &BTreeSet<String>,
    ) -> usize {
        let fallback = self.fallback.cluster_name();
        let mut replaced = 0;

        for virtual_host in route_configuration.virtual_hosts.iter_mut() {
            for route in virtual_host.routes.iter_mut() {
                let errored = errored_routes.contains(&route.name);
                let route_name = route.name.clone();
                for cluster in route_clusters_mut(route) {
                    if cluster.as_str() == fallback {
                        continue;
                    }
                    if errored || !valid_destinations.contains(cluster.as_str()) {
                        debug!(route = %route_name, cluster = %cluster, errored, "Replacing route destination");
                        *cluster = fallback.to_string();
                        replaced += 1;
                    }
                }
            }
        }
        replaced
    }

    fn inject_fallback(&self, snapshot: &mut XdsSnapshot) {
        let cluster = self.fallback.cluster().clone();
        if snapshot.clusters.upsert(cluster.name.clone(), cluster) {
            snapshot.clusters.refresh_version();
            info!(cluster = %self.fallback.cluster_name(), "Injected fallback cluster");
        }

        let listener = self.fallback.listener().clone();
        if snapshot.listeners.upsert(listener.name.clone(), listener) {
            snapshot.listeners.refresh_version();
            info!(listener = %self.fallback.listener_name(), "Injected fallback listener");
        }
    }
}

/// Downgrade route-level errors to warnings, returning the affected routes.
fn classify_reports(reports: &mut ResourceReports) -> BTreeSet<String> {
    let mut errored = BTreeSet::new();
    for (proxy, report) in reports.iter_mut() {
        let routes = split_route_errors(report, ROUTE_ERROR_MARKER);
        if !routes.is_empty() {
            debug!(proxy = %proxy, routes = routes.len(), "Downgraded route errors to warnings");
        }
        errored.extend(routes);
    }
    errored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProxyId;
    use crate::errors::SwitchyardError;
    use crate::validation::{RouteError, ValidationReport};
    use crate::xds::fallback::direct_response_of;
    use crate::xds::fixtures::{cluster, route_configuration, single_route, weighted_route};
    use crate::xds::snapshot::route_clusters;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    const FALLBACK: &str = "fallback_cluster_for_invalid_routes";

    fn enabled() -> RouteReplacingSanitizer {
        RouteReplacingSanitizer::new(&SanitizerConfig {
            enabled: true,
            fallback_status_code: 418,
            fallback_body: "no route".to_string(),
            ..Default::default()
        })
    }

    fn valid(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn destinations(snapshot: &XdsSnapshot, rc: &str) -> Vec<String> {
        snapshot.routes.items[rc].virtual_hosts[0]
            .routes
            .iter()
            .flat_map(|route| route_clusters(route).into_iter().map(str::to_string))
            .collect()
    }

    #[test]
    fn invalid_single_cluster_route_is_redirected_to_fallback() {
        let candidate = XdsSnapshot::new("v1")
            .with_cluster(cluster("cluster-B"))
            .with_route_configuration(route_configuration("rc1", vec![single_route("r0", "cluster-A")]));

        let sanitized = enabled()
            .sanitize(candidate, &valid(&["cluster-B"]), &mut ResourceReports::new())
            .unwrap();

        assert_eq!(destinations(&sanitized, "rc1"), vec![FALLBACK]);
        assert!(sanitized.clusters.contains(FALLBACK));
        let listener = sanitized.listeners.get("fallback_listener_for_invalid_routes").unwrap();
        assert_eq!(direct_response_of(listener), Some((418, "no route".to_string())));
        assert_ne!(sanitized.routes.version, "v1");
        assert_ne!(sanitized.clusters.version, "v1");
    }

    #[test]
    #[traced_test]
    fn weighted_entries_are_checked_independently() {
        let candidate = XdsSnapshot::new("v1")
            .with_cluster(cluster("good"))
            .with_route_configuration(route_configuration(
                "rc1",
                vec![weighted_route("split", &["good", "gone"])],
            ));

        let sanitized = enabled()
            .sanitize(candidate, &valid(&["good"]), &mut ResourceReports::new())
            .unwrap();
        assert_eq!(destinations(&sanitized, "rc1"), vec!["good", FALLBACK]);
        assert!(logs_contain("Redirected invalid routes to the fallback cluster"));
    }

    #[test]
    fn errored_route_is_replaced_and_error_downgraded() {
        let candidate = XdsSnapshot::new("v1")
            .with_cluster(cluster("cluster-a"))
            .with_route_configuration(route_configuration(
                "rc1",
                vec![single_route("broken", "cluster-a"), single_route("fine", "cluster-a")],
            ));

        let proxy = ProxyId::new("gloo-system", "gateway-proxy");
        let mut report = ValidationReport::new();
        report.add_error(RouteError::new("bad prefix rewrite", "broken"));
        report.add_error("listener bind conflict");
        let mut reports = ResourceReports::from([(proxy.clone(), report)]);

        let sanitized = enabled().sanitize(candidate, &valid(&["cluster-a"]), &mut reports).unwrap();

        assert_eq!(destinations(&sanitized, "rc1"), vec![FALLBACK, "cluster-a"]);
        let report = &reports[&proxy];
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.warnings, vec!["bad prefix rewrite. Route Error: broken".to_string()]);
    }

    #[test]
    fn route_error_with_marker_in_reason_is_still_neutralized() {
        let candidate = XdsSnapshot::new("v1")
            .with_cluster(cluster("cluster-a"))
            .with_route_configuration(route_configuration("rc1", vec![single_route("r1", "cluster-a")]));

        let mut report = ValidationReport::new();
        report.add_error(RouteError::new("upstream rejected. Route Error: inherited", "r1"));
        let mut reports = ResourceReports::from([(ProxyId::new("ns", "proxy"), report)]);

        let sanitized = enabled().sanitize(candidate, &valid(&["cluster-a"]), &mut reports).unwrap();
        assert_eq!(destinations(&sanitized, "rc1"), vec![FALLBACK]);
        assert!(ensure_no_errors(&reports).is_ok());
    }

    #[test]
    fn clean_candidate_passes_through_unchanged() {
        let candidate = XdsSnapshot::new("v1")
            .with_cluster(cluster("cluster-a"))
            .with_route_configuration(route_configuration("rc1", vec![single_route("r0", "cluster-a")]));

        let sanitized = enabled()
            .sanitize(candidate.clone(), &valid(&["cluster-a"]), &mut ResourceReports::new())
            .unwrap();
        assert_eq!(sanitized, candidate);
        assert!(sanitized.listeners.is_empty());
    }

    #[test]
    fn disabled_sanitizer_rejects_warnings() {
        let sanitizer = RouteReplacingSanitizer::new(&SanitizerConfig::default());
        assert!(!sanitizer.is_enabled());

        let candidate = XdsSnapshot::new("v1")
            .with_cluster(cluster("cluster-a"))
            .with_route_configuration(route_configuration("rc1", vec![single_route("r0", "cluster-a")]));

        let proxy = ProxyId::new("gloo-system", "gateway-proxy");
        let mut report = ValidationReport::new();
        report.add_warning("virtual host has no domains");
        let mut reports = ResourceReports::from([(proxy.clone(), report)]);

        let err = sanitizer.sanitize(candidate.clone(), &valid(&[]), &mut reports).unwrap_err();
        assert!(matches!(err, SwitchyardError::Validation { .. }));
        assert_eq!(reports[&proxy].errors.len(), 1);

        let passed = sanitizer
            .sanitize(candidate.clone(), &valid(&[]), &mut ResourceReports::new())
            .unwrap();
        assert_eq!(passed, candidate);
    }

    #[test]
    fn valid_destination_missing_from_clusters_is_an_invariant_violation() {
        let candidate = XdsSnapshot::new("v1")
            .with_route_configuration(route_configuration("rc1", vec![single_route("r0", "cluster-a")]));

        let err = enabled()
            .sanitize(candidate, &valid(&["cluster-a"]), &mut ResourceReports::new())
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::Invariant { .. }));
    }

    fn arb_candidate() -> impl Strategy<Value = (XdsSnapshot, HashSet<String>, Vec<String>)> {
        let names = prop::sample::select(vec!["a", "b", "c", "d"]);
        (
            prop::collection::vec(prop::collection::vec(names.clone(), 1..3), 1..6),
            prop::collection::btree_set(names.clone(), 0..4),
            prop::collection::btree_set(0usize..6, 0..3),
        )
            .prop_map(|(routes, valid_set, errored)| {
                let routes: Vec<_> = routes
                    .iter()
                    .enumerate()
                    .map(|(i, targets)| {
                        let name = format!("route-{}", i);
                        if targets.len() == 1 {
                            single_route(&name, targets[0])
                        } else {
                            weighted_route(&name, targets)
                        }
                    })
                    .collect();
                let mut candidate =
                    XdsSnapshot::new("v1").with_route_configuration(route_configuration("rc1", routes));
                for name in &valid_set {
                    candidate = candidate.with_cluster(cluster(name));
                }
                let valid = valid_set.iter().map(|n| n.to_string()).collect();
                let errored = errored.into_iter().map(|i| format!("route-{}", i)).collect();
                (candidate, valid, errored)
            })
    }

    fn reports_for(errored: &[String]) -> ResourceReports {
        let mut report = ValidationReport::new();
        for route in errored {
            report.add_error(RouteError::new("rejected", route.clone()));
        }
        ResourceReports::from([(ProxyId::new("ns", "proxy"), report)])
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent_and_consistent((candidate, valid, errored) in arb_candidate()) {
            let sanitizer = enabled();

            let once = sanitizer.sanitize(candidate, &valid, &mut reports_for(&errored)).unwrap();
            prop_assert!(once.check_consistency().is_ok());

            let twice = sanitizer.sanitize(once.clone(), &valid, &mut reports_for(&errored)).unwrap();
            prop_assert_eq!(twice, once);
        }
    }
}
