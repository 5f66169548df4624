//! Prometheus instant queries
//!
//! The backend is reached one of two ways, chosen once from the shape of the
//! configured endpoint:
//! - a full `http://` or `https://` URL is queried directly
//! - a `namespace/service:port` triple is queried through the Kubernetes API
//!   server's service proxy subresource

mod direct;
mod proxy;


pub use direct::DirectTransport;
pub use proxy::ProxyTransport;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::{Result, UsageError};

/// Path of the instant query API, relative to the Prometheus root
pub const QUERY_API_PATH: &str = "api/v1/query";

const STATUS_SUCCESS: &str = "success";

/// Envelope returned by `/api/v1/query`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: QueryData,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    #[serde(default)]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<QueryResult>,
}

/// One labelled series of an instant vector
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    /// `[timestamp, "value"]`, kept loose so bad rows can be skipped one by one
    #[serde(default)]
    pub value: Vec<Value>,
}

impl QueryResult {
    /// Label value, or the empty string when the label is absent
    pub fn label(&self, name: &str) -> &str {
        self.metric.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Decode a response body and reject anything not reported as successful
pub fn decode_response(body: &[u8]) -> Result<QueryResponse> {
    let response: QueryResponse = serde_json::from_slice(body)?;

    if response.status != STATUS_SUCCESS {
        return Err(UsageError::QueryFailed {
            status: response.status,
            error: response.error,
        });
    }

    Ok(response)
}

/// Where the backend lives and how to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Queried over plain HTTP(S)
    Direct(Url),
    /// Queried through `services/{service}:{port}/proxy` on the API server.
    /// The port may be a number or a named service port.
    Proxy {
        namespace: String,
        service: String,
        port: String,
    },
}

impl Endpoint {
    /// Classify and validate an endpoint string.
    ///
    /// No network access happens here, so malformed endpoints are rejected
    /// before any query is sent.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let invalid = || UsageError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
        };

        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            let url = Url::parse(endpoint).map_err(|_| invalid())?;
            return Ok(Endpoint::Direct(url));
        }

        let parts: Vec<&str> = endpoint.split('/').collect();
        let &[namespace, service_port] = parts.as_slice() else {
            return Err(invalid());
        };
        let parts: Vec<&str> = service_port.split(':').collect();
        let &[service, port] = parts.as_slice() else {
            return Err(invalid());
        };
        if namespace.is_empty() || service.is_empty() || port.is_empty() {
            return Err(invalid());
        }

        Ok(Endpoint::Proxy {
            namespace: namespace.to_string(),
            service: service.to_string(),
            port: port.to_string(),
        })
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Endpoint::Direct(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Direct(url) => write!(f, "{}", url),
            Endpoint::Proxy {
                namespace,
                service,
                port,
            } => write!(f, "{}/{}:{}", namespace, service, port),
        }
    }
}

/// Something that can run an instant query and hand back a validated response
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, promql: &str) -> Result<QueryResponse>;

    /// Short transport name for logs
    fn name(&self) -> &'static str;
}

/// The two ways of reaching the backend
pub enum Transport {
    Direct(DirectTransport),
    Proxy(ProxyTransport),
}

impl Transport {
    /// Build the transport matching `endpoint`.
    ///
    /// The proxy transport needs a cluster client; the direct transport uses
    /// its own HTTP client with `timeout` applied per request.
    pub fn connect(
        endpoint: &Endpoint,
        cluster: Option<&kube::Client>,
        timeout: Duration,
    ) -> Result<Self> {
        match endpoint {
            Endpoint::Direct(url) => Ok(Transport::Direct(DirectTransport::new(
                url.clone(),
                timeout,
            )?)),
            Endpoint::Proxy {
                namespace,
                service,
                port,
            } => {
                let client = cluster
                    .cloned()
                    .ok_or(UsageError::ClusterClientRequired("the API server proxy transport"))?;
                Ok(Transport::Proxy(ProxyTransport::new(
                    client, namespace, service, port,
                )))
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for Transport {
    async fn query(&self, promql: &str) -> Result<QueryResponse> {
        let body = match self {
            Transport::Direct(t) => t.fetch(promql).await?,
            Transport::Proxy(t) => t.fetch(promql).await?,
        };
        decode_response(&body)
    }

    fn name(&self) -> &'static str {
        match self {
            Transport::Direct(_) => "direct",
            Transport::Proxy(_) => "proxy",
        }
    }
}
