//! # Metrics Collection
//!
//! Records control-plane telemetry through the `metrics` facade. Installing an
//! exporter is left to the embedding process.

use metrics::{counter, gauge};

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record a merged snapshot handed to the aggregator's consumer
    pub fn record_snapshot_emitted(&self, namespace: &str, resource_count: usize) {
        let labels = [("namespace", namespace.to_string())];
        counter!("aggregator_snapshots_emitted_total", &labels).increment(1);
        gauge!("aggregator_merged_resources", &labels).set(resource_count as f64);
    }

    /// Record an emission skipped because the consumer was not ready
    pub fn record_snapshot_skipped(&self, namespace: &str) {
        let labels = [("namespace", namespace.to_string())];
        counter!("aggregator_snapshots_skipped_total", &labels).increment(1);
    }

    /// Record an error reported by one source
    pub fn record_source_error(&self, source: &str) {
        let labels = [("source", source.to_string())];
        counter!("aggregator_source_errors_total", &labels).increment(1);
    }

    /// Record one discovery attempt outcome
    pub fn record_discovery_attempt(&self, target: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        let labels = [("target", target.to_string()), ("status", status.to_string())];
        counter!("discovery_attempts_total", &labels).increment(1);
    }

    /// Record how many routes one RouteConfiguration had redirected to the fallback
    pub fn record_routes_replaced(&self, route_config: &str, replaced: usize) {
        let labels = [("route_config", route_config.to_string())];
        gauge!("sanitizer_routes_replaced", &labels).set(replaced as f64);
    }

    /// Record whether the last sanitize pass replaced anything at all
    pub fn record_sanitize_outcome(&self, any_replaced: bool) {
        gauge!("sanitizer_replacement_active").set(if any_replaced { 1.0 } else { 0.0 });
        counter!("sanitizer_runs_total").increment(1);
    }

    /// Record one translation cycle outcome
    pub fn record_sync_cycle(&self, node_id: &str, applied: bool) {
        let status = if applied { "applied" } else { "rejected" };
        let labels = [("node_id", node_id.to_string()), ("status", status.to_string())];
        counter!("sync_cycles_total", &labels).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        let recorder = MetricsRecorder::new();
        recorder.record_snapshot_emitted("default", 3);
        recorder.record_snapshot_skipped("default");
        recorder.record_source_error("kube");
        recorder.record_discovery_attempt("default/aws", false);
        recorder.record_routes_replaced("rc1", 2);
        recorder.record_sanitize_outcome(true);
        recorder.record_sync_cycle("gateway-proxy", false);
    }
}
