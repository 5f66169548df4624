//! Observability for snapshot building
//!
//! Provides:
//! - Prometheus client metrics (query latency, query errors, skipped samples)
//! - Structured logging of discovery and query events with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::locator::BackendCandidate;
use crate::source::MetricKind;

/// Histogram buckets for query latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SourceMetricsInner> = OnceLock::new();

struct SourceMetricsInner {
    query_latency_seconds: HistogramVec,
    query_errors: IntCounterVec,
    malformed_samples: IntCounter,
}

impl SourceMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram_vec!(
                "usage_source_query_latency_seconds",
                "Time spent running a Prometheus instant query",
                &["metric"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            query_errors: register_int_counter_vec!(
                "usage_source_query_errors_total",
                "Prometheus queries that failed",
                &["metric"]
            )
            .expect("Failed to register query_errors"),

            malformed_samples: register_int_counter!(
                "usage_source_malformed_samples_total",
                "Samples skipped because their value could not be parsed"
            )
            .expect("Failed to register malformed_samples"),
        }
    }
}

/// Handle to the process-wide snapshot metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct SourceMetrics {
    _private: (),
}

impl Default for SourceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SourceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SourceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_query_latency(&self, metric: MetricKind, elapsed: Duration) {
        self.inner()
            .query_latency_seconds
            .with_label_values(&[metric.label()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_query_errors(&self, metric: MetricKind) {
        self.inner()
            .query_errors
            .with_label_values(&[metric.label()])
            .inc();
    }

    pub fn inc_malformed_samples(&self) {
        self.inner().malformed_samples.inc();
    }

    pub fn malformed_samples(&self) -> u64 {
        self.inner().malformed_samples.get()
    }

    pub fn query_errors(&self, metric: MetricKind) -> u64 {
        self.inner()
            .query_errors
            .with_label_values(&[metric.label()])
            .get()
    }

    /// Everything in the default registry, in the text exposition format
    pub fn render_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for snapshot events
#[derive(Clone, Default)]
pub struct SnapshotLogger;

impl SnapshotLogger {
    pub fn log_discovered(&self, endpoint: &str, candidates: usize) {
        info!(
            event = "backend_discovered",
            endpoint = %endpoint,
            candidates = candidates,
            "Discovered Prometheus"
        );
    }

    /// Several Prometheus services matched; the first one is used
    pub fn log_ambiguous_backends(&self, candidates: &[BackendCandidate]) {
        let listed: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        warn!(
            event = "backend_ambiguous",
            count = candidates.len(),
            selected = %listed.first().map(String::as_str).unwrap_or_default(),
            candidates = ?listed,
            "Found {} Prometheus services, using first match. Set the endpoint explicitly to choose another",
            candidates.len()
        );
    }

    pub fn log_query(&self, metric: MetricKind, transport: &str, rows: usize, elapsed: Duration) {
        debug!(
            event = "query_completed",
            metric = %metric,
            transport = %transport,
            rows = rows,
            elapsed_ms = elapsed.as_millis() as u64,
            "Prometheus query completed"
        );
    }

    pub fn log_query_failed(&self, metric: MetricKind, transport: &str, error: &str) {
        warn!(
            event = "query_failed",
            metric = %metric,
            transport = %transport,
            error = %error,
            "Prometheus query failed"
        );
    }

    pub fn log_skipped_sample(&self, metric: MetricKind, key: &str, error: &str) {
        debug!(
            event = "sample_skipped",
            metric = %metric,
            key = %key,
            error = %error,
            "Skipping malformed sample"
        );
    }

    pub fn log_snapshot(&self, endpoint: &str, pods: usize, nodes: usize) {
        info!(
            event = "snapshot_built",
            endpoint = %endpoint,
            pods = pods,
            nodes = nodes,
            "Built usage snapshot"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_metrics_record_and_render() {
        let metrics = SourceMetrics::new();

        let before = metrics.query_errors(MetricKind::NodeCpu);
        metrics.observe_query_latency(MetricKind::NodeCpu, Duration::from_millis(12));
        metrics.inc_query_errors(MetricKind::NodeCpu);
        assert!(metrics.query_errors(MetricKind::NodeCpu) > before);

        let text = metrics.render_text();
        assert!(text.contains("usage_source_query_latency_seconds"));
        assert!(text.contains("metric=\"node_cpu\""));
    }

    #[test]
    fn test_clones_share_metrics() {
        let a = SourceMetrics::new();
        let b = a.clone();
        let before = a.malformed_samples();
        b.inc_malformed_samples();
        assert!(a.malformed_samples() > before);
    }
}
