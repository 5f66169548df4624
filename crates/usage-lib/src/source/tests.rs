//! Snapshot tests
//!
//! Fake executors cover the fold and fail-fast behaviour; mockito servers
//! cover the full path from configuration to snapshot for both transports.

use super::*;
use crate::query::decode_response;
use async_trait::async_trait;
use mockito::{Matcher, ServerGuard};
use serde_json::json;
use std::collections::{HashMap, HashSet};

fn vector(rows: serde_json::Value) -> String {
    json!({"status": "success", "data": {"resultType": "vector", "result": rows}}).to_string()
}

fn container_cpu_body() -> String {
    vector(json!([
        {"metric": {"namespace": "ns1", "pod": "p1", "container": "c1"}, "value": [1700000000, "0.5"]}
    ]))
}

fn container_memory_body() -> String {
    vector(json!([
        {"metric": {"namespace": "ns1", "pod": "p1", "container": "c1"}, "value": [1700000000, "1000000"]}
    ]))
}

fn node_cpu_body() -> String {
    vector(json!([
        {"metric": {"node": "worker-1"}, "value": [1700000000, "1.25"]}
    ]))
}

fn node_memory_body() -> String {
    vector(json!([
        {"metric": {"node": "worker-1"}, "value": [1700000000, "4294967296"]}
    ]))
}

fn body_for(metric: MetricKind) -> String {
    match metric {
        MetricKind::ContainerCpu => container_cpu_body(),
        MetricKind::ContainerMemory => container_memory_body(),
        MetricKind::NodeCpu => node_cpu_body(),
        MetricKind::NodeMemory => node_memory_body(),
    }
}

/// Answers each query from a fixed body; unknown queries fail with HTTP 500
struct FakeBackend {
    bodies: HashMap<&'static str, String>,
}

impl FakeBackend {
    fn healthy() -> Self {
        let bodies = MetricKind::ALL
            .iter()
            .map(|m| (m.query(), body_for(*m)))
            .collect();
        Self { bodies }
    }

    fn replace(mut self, metric: MetricKind, body: &str) -> Self {
        self.bodies.insert(metric.query(), body.to_string());
        self
    }
}

#[async_trait]
impl QueryExecutor for FakeBackend {
    async fn query(&self, promql: &str) -> Result<QueryResponse> {
        match self.bodies.get(promql) {
            Some(body) => decode_response(body.as_bytes()),
            None => Err(UsageError::upstream_http(500, "unexpected query")),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

fn assert_round_trip(snapshot: &UsageSnapshot) {
    assert_eq!(snapshot.pods.len(), 1);
    let pod = snapshot.pod("ns1", "p1").expect("pod ns1/p1");
    assert_eq!(pod.containers.len(), 1);
    let c1 = pod.container("c1").expect("container c1");
    assert_eq!(c1.cpu.unwrap().to_string(), "500m");
    assert_eq!(c1.memory.unwrap().to_string(), "1000000");

    assert_eq!(snapshot.nodes.len(), 1);
    let node = snapshot.node("worker-1").expect("node worker-1");
    assert_eq!(node.cpu.unwrap().millis(), 1250);
    assert_eq!(node.memory.unwrap().to_string(), "4Gi");
}

#[test]
fn test_queries_are_distinct_and_labelled() {
    let queries: HashSet<&str> = MetricKind::ALL.iter().map(|m| m.query()).collect();
    assert_eq!(queries.len(), 4);
    assert!(MetricKind::ContainerCpu.query().contains("[5m]"));
    assert_eq!(MetricKind::NodeCpu.to_string(), "node CPU");
    assert_eq!(MetricKind::ContainerMemory.label(), "container_memory");
}

#[test]
fn test_source_config_defaults() {
    let config: SourceConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.endpoint, None);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));

    let config = SourceConfig::with_endpoint("monitoring/prometheus:9090");
    assert_eq!(config.endpoint.as_deref(), Some("monitoring/prometheus:9090"));
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let source = UsageSource::new(SourceConfig::default());
    let snapshot = source
        .snapshot_from(&FakeBackend::healthy(), "fake")
        .await
        .unwrap();

    assert_round_trip(&snapshot);
    assert_eq!(snapshot.window, "5m");
    assert_eq!(snapshot.endpoint, "fake");
}

#[tokio::test]
async fn test_failed_status_aborts_whole_snapshot() {
    let backend = FakeBackend::healthy().replace(
        MetricKind::NodeMemory,
        r#"{"status":"error","errorType":"timeout","error":"query timed out"}"#,
    );
    let source = UsageSource::new(SourceConfig::default());

    match source.snapshot_from(&backend, "fake").await {
        Err(UsageError::Query { metric, source }) => {
            assert_eq!(metric, MetricKind::NodeMemory);
            assert!(matches!(*source, UsageError::QueryFailed { .. }));
        }
        other => panic!("expected query failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_body_aborts_whole_snapshot() {
    let backend = FakeBackend::healthy().replace(MetricKind::ContainerCpu, "{");
    let source = UsageSource::new(SourceConfig::default());

    let err = source.snapshot_from(&backend, "fake").await.unwrap_err();
    assert!(matches!(err.root(), UsageError::Decode(_)));
    assert!(err.to_string().starts_with("querying container CPU"));
}

#[tokio::test]
async fn test_invalid_explicit_endpoint_fails_before_querying() {
    let source = UsageSource::new(SourceConfig::with_endpoint("prometheus:9090"));
    assert!(matches!(
        source.fetch_snapshot().await,
        Err(UsageError::InvalidEndpoint { .. })
    ));
}

#[tokio::test]
async fn test_discovery_without_cluster_client() {
    let source = UsageSource::new(SourceConfig::default());
    match source.fetch_snapshot().await {
        Err(UsageError::Discovery(inner)) => {
            assert!(matches!(*inner, UsageError::ClusterClientRequired(_)))
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

async fn mock_queries(server: &mut ServerGuard, path: &str) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();
    for metric in MetricKind::ALL {
        let mock = server
            .mock("GET", path)
            .match_query(Matcher::UrlEncoded("query".into(), metric.query().into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body_for(metric))
            .create_async()
            .await;
        mocks.push(mock);
    }
    mocks
}

#[tokio::test]
async fn test_fetch_snapshot_direct() {
    let mut server = mockito::Server::new_async().await;
    let mocks = mock_queries(&mut server, "/api/v1/query").await;

    let source = UsageSource::new(SourceConfig::with_endpoint(server.url()));
    let snapshot = source.fetch_snapshot().await.unwrap();

    assert_round_trip(&snapshot);
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_fetch_snapshot_direct_upstream_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let source = UsageSource::new(SourceConfig::with_endpoint(server.url()));
    let err = source.fetch_snapshot().await.unwrap_err();
    assert!(matches!(
        err.root(),
        UsageError::UpstreamHttp { status: 500, .. }
    ));
}

#[tokio::test]
async fn test_fetch_snapshot_discovers_and_proxies() {
    let mut server = mockito::Server::new_async().await;

    let services = json!({
        "apiVersion": "v1",
        "kind": "ServiceList",
        "metadata": {"resourceVersion": "100"},
        "items": [{
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "prometheus-k8s", "namespace": "monitoring"},
            "spec": {"ports": [{"name": "web", "port": 9090}]}
        }]
    });
    let list_mock = server
        .mock("GET", "/api/v1/services")
        .match_query(Matcher::UrlEncoded(
            "labelSelector".into(),
            "app.kubernetes.io/name=prometheus".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(services.to_string())
        .expect(2)
        .create_async()
        .await;

    // The other two selectors are not mocked and fail, which discovery tolerates.
    let query_mocks = mock_queries(
        &mut server,
        "/api/v1/namespaces/monitoring/services/prometheus-k8s:9090/proxy/api/v1/query",
    )
    .await;

    let config = kube::Config::new(server.url().parse().unwrap());
    let client = kube::Client::try_from(config).unwrap();
    let source = UsageSource::new(SourceConfig::default()).with_cluster(client);

    let resolved = source.resolve_endpoint().await.unwrap();
    assert_eq!(resolved.endpoint.to_string(), "monitoring/prometheus-k8s:9090");
    assert!(!resolved.discovery.unwrap().is_ambiguous());

    let snapshot = source.fetch_snapshot().await.unwrap();
    assert_round_trip(&snapshot);
    assert_eq!(snapshot.endpoint, "monitoring/prometheus-k8s:9090");

    list_mock.assert_async().await;
    for mock in query_mocks {
        mock.assert_async().await;
    }
}
