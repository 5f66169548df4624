//! Snapshot building
//!
//! Resolves the backend (explicit endpoint or discovery), runs the four usage
//! queries and folds them into a [`UsageSnapshot`]. Any failing query aborts
//! the whole snapshot; nothing partial is returned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::aggregator::{build_node_usage, build_pod_usage};
use crate::error::{Result, UsageError};
use crate::locator::{locate, Discovery};
use crate::models::UsageSnapshot;
use crate::observability::{SnapshotLogger, SourceMetrics};
use crate::query::{Endpoint, QueryExecutor, QueryResponse, Transport};

/// Rate window of the CPU queries
pub const RATE_WINDOW: &str = "5m";

const CONTAINER_CPU_QUERY: &str = r#"sum by (namespace, pod, container) (rate(container_cpu_usage_seconds_total{container!="",container!="POD"}[5m]))"#;
const CONTAINER_MEMORY_QUERY: &str = r#"sum by (namespace, pod, container) (container_memory_working_set_bytes{container!="",container!="POD"})"#;
const NODE_CPU_QUERY: &str = r#"sum by (node) (rate(container_cpu_usage_seconds_total{container!=""}[5m]))"#;
const NODE_MEMORY_QUERY: &str = r#"sum by (node) (container_memory_working_set_bytes{container!=""})"#;

/// The four series a snapshot is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    ContainerCpu,
    ContainerMemory,
    NodeCpu,
    NodeMemory,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::ContainerCpu,
        MetricKind::ContainerMemory,
        MetricKind::NodeCpu,
        MetricKind::NodeMemory,
    ];

    /// PromQL sent for this metric
    pub fn query(&self) -> &'static str {
        match self {
            MetricKind::ContainerCpu => CONTAINER_CPU_QUERY,
            MetricKind::ContainerMemory => CONTAINER_MEMORY_QUERY,
            MetricKind::NodeCpu => NODE_CPU_QUERY,
            MetricKind::NodeMemory => NODE_MEMORY_QUERY,
        }
    }

    /// Metric label value
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::ContainerCpu => "container_cpu",
            MetricKind::ContainerMemory => "container_memory",
            MetricKind::NodeCpu => "node_cpu",
            MetricKind::NodeMemory => "node_memory",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::ContainerCpu => "container CPU",
            MetricKind::ContainerMemory => "container memory",
            MetricKind::NodeCpu => "node CPU",
            MetricKind::NodeMemory => "node memory",
        };
        f.write_str(name)
    }
}

/// Settings consumed by [`UsageSource`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `http(s)://...` or `namespace/service:port`; discovered when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout of the direct transport
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SourceConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// An endpoint ready to be queried, plus the discovery that produced it
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub endpoint: Endpoint,
    pub discovery: Option<Discovery>,
}

/// Builds usage snapshots from Prometheus
pub struct UsageSource {
    config: SourceConfig,
    cluster: Option<kube::Client>,
    logger: SnapshotLogger,
    metrics: SourceMetrics,
}

impl UsageSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            cluster: None,
            logger: SnapshotLogger::default(),
            metrics: SourceMetrics::new(),
        }
    }

    /// Attach a cluster client, needed for discovery and the proxy transport
    pub fn with_cluster(mut self, client: kube::Client) -> Self {
        self.cluster = Some(client);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Search the cluster for a Prometheus service
    pub async fn discover(&self) -> Result<Discovery> {
        let client = self
            .cluster
            .as_ref()
            .ok_or(UsageError::ClusterClientRequired("Prometheus auto-discovery"))?;
        locate(client).await
    }

    /// The configured endpoint, or the discovered one when none is set
    pub async fn resolve_endpoint(&self) -> Result<ResolvedEndpoint> {
        if let Some(endpoint) = self.config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            return Ok(ResolvedEndpoint {
                endpoint: Endpoint::parse(endpoint)?,
                discovery: None,
            });
        }

        let discovery = self
            .discover()
            .await
            .map_err(|e| UsageError::Discovery(Box::new(e)))?;
        let endpoint = discovery.endpoint();
        self.logger
            .log_discovered(&endpoint, discovery.candidates().len());

        Ok(ResolvedEndpoint {
            endpoint: Endpoint::parse(&endpoint)?,
            discovery: Some(discovery),
        })
    }

    /// Resolve the backend and build a snapshot from it
    pub async fn fetch_snapshot(&self) -> Result<UsageSnapshot> {
        let resolved = self.resolve_endpoint().await?;
        self.snapshot_at(&resolved).await
    }

    /// Build a snapshot from an endpoint resolved earlier
    pub async fn snapshot_at(&self, resolved: &ResolvedEndpoint) -> Result<UsageSnapshot> {
        let transport = Transport::connect(
            &resolved.endpoint,
            self.cluster.as_ref(),
            self.config.request_timeout(),
        )?;

        self.snapshot_from(&transport, &resolved.endpoint.to_string())
            .await
    }

    /// Build a snapshot with an already connected executor.
    ///
    /// The four queries run concurrently; the first failure is returned and
    /// the remaining queries are dropped.
    pub async fn snapshot_from<E>(&self, executor: &E, endpoint: &str) -> Result<UsageSnapshot>
    where
        E: QueryExecutor + ?Sized,
    {
        let (container_cpu, container_memory, node_cpu, node_memory) = tokio::try_join!(
            self.run_query(executor, MetricKind::ContainerCpu),
            self.run_query(executor, MetricKind::ContainerMemory),
            self.run_query(executor, MetricKind::NodeCpu),
            self.run_query(executor, MetricKind::NodeMemory),
        )?;

        let pods = build_pod_usage(&container_cpu, &container_memory);
        let nodes = build_node_usage(&node_cpu, &node_memory);
        self.logger.log_snapshot(endpoint, pods.len(), nodes.len());

        Ok(UsageSnapshot {
            timestamp: Utc::now(),
            window: RATE_WINDOW.to_string(),
            endpoint: endpoint.to_string(),
            pods,
            nodes,
        })
    }

    async fn run_query<E>(&self, executor: &E, metric: MetricKind) -> Result<QueryResponse>
    where
        E: QueryExecutor + ?Sized,
    {
        let started = Instant::now();
        match executor.query(metric.query()).await {
            Ok(response) => {
                let elapsed = started.elapsed();
                self.metrics.observe_query_latency(metric, elapsed);
                self.logger
                    .log_query(metric, executor.name(), response.data.result.len(), elapsed);
                Ok(response)
            }
            Err(e) => {
                self.metrics.inc_query_errors(metric);
                self.logger
                    .log_query_failed(metric, executor.name(), &e.to_string());
                Err(e.for_query(metric))
            }
        }
    }
}

#[cfg(test)]
mod tests;
