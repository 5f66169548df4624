//! Error types for snapshot building

use thiserror::Error;

use crate::source::MetricKind;

/// Longest upstream body kept in an error message
const BODY_SNIPPET_LEN: usize = 512;

/// Errors raised while locating the backend, querying it, or parsing samples.
///
/// Every variant except [`UsageError::MalformedSample`] aborts snapshot
/// building. Malformed samples are skipped row by row.
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("no Prometheus service found (searched labels: {selectors:?})")]
    NotFound { selectors: Vec<String> },

    #[error("invalid Prometheus endpoint format {endpoint:?}, expected namespace/service:port")]
    InvalidEndpoint { endpoint: String },

    #[error("Prometheus returned HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("HTTP request to Prometheus: {0}")]
    Request(#[from] reqwest::Error),

    #[error("listing services: {0}")]
    ServiceLookup(#[source] kube::Error),

    #[error("K8s API proxy request to Prometheus: {0}")]
    UpstreamProxy(#[source] kube::Error),

    #[error("parsing Prometheus response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Prometheus query failed with status: {status}{}", detail(.error))]
    QueryFailed {
        status: String,
        error: Option<String>,
    },

    #[error("malformed sample: {0}")]
    MalformedSample(String),

    #[error("a Kubernetes client is required for {0}")]
    ClusterClientRequired(&'static str),

    #[error("building HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("auto-discovering Prometheus: {0}")]
    Discovery(#[source] Box<UsageError>),

    #[error("querying {metric}: {source}")]
    Query {
        metric: MetricKind,
        #[source]
        source: Box<UsageError>,
    },
}

fn detail(error: &Option<String>) -> String {
    error
        .as_deref()
        .map(|e| format!(" ({e})"))
        .unwrap_or_default()
}

impl UsageError {
    /// Build an [`UsageError::UpstreamHttp`], truncating the body to a snippet.
    pub fn upstream_http(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(BODY_SNIPPET_LEN) {
            Some((idx, _)) => format!("{}...", &body[..idx]),
            None => body.to_string(),
        };
        UsageError::UpstreamHttp { status, body }
    }

    /// Wrap this error with the metric whose query produced it.
    pub fn for_query(self, metric: MetricKind) -> Self {
        UsageError::Query {
            metric,
            source: Box::new(self),
        }
    }

    /// The innermost error, with discovery and query context removed.
    pub fn root(&self) -> &UsageError {
        match self {
            UsageError::Discovery(inner) => inner.root(),
            UsageError::Query { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, UsageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_http_truncates_long_bodies() {
        let body = "x".repeat(BODY_SNIPPET_LEN + 100);
        match UsageError::upstream_http(502, &body) {
            UsageError::UpstreamHttp { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), BODY_SNIPPET_LEN + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_query_context_is_kept_in_message_and_root() {
        let err = UsageError::QueryFailed {
            status: "error".to_string(),
            error: Some("bad_data".to_string()),
        }
        .for_query(MetricKind::NodeMemory);

        assert_eq!(
            err.to_string(),
            "querying node memory: Prometheus query failed with status: error (bad_data)"
        );
        assert!(matches!(err.root(), UsageError::QueryFailed { .. }));
    }
}
