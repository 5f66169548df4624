//! Transport through the API server's service proxy subresource

use tracing::debug;
use url::form_urlencoded;

use super::QUERY_API_PATH;
use crate::error::{Result, UsageError};

/// Queries Prometheus as `services/{service}:{port}/proxy` in `namespace`
pub struct ProxyTransport {
    client: kube::Client,
    namespace: String,
    service: String,
    port: String,
}

impl ProxyTransport {
    pub fn new(client: kube::Client, namespace: &str, service: &str, port: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            service: service.to_string(),
            port: port.to_string(),
        }
    }

    /// API server path, including the encoded query string
    pub fn request_path(&self, promql: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("query", promql)
            .finish();

        format!(
            "/api/v1/namespaces/{}/services/{}:{}/proxy/{}?{}",
            self.namespace, self.service, self.port, QUERY_API_PATH, query
        )
    }

    pub async fn fetch(&self, promql: &str) -> Result<Vec<u8>> {
        let path = self.request_path(promql);
        debug!(
            namespace = %self.namespace,
            service = %self.service,
            port = %self.port,
            "Querying Prometheus through the API server proxy"
        );

        let request = http::Request::get(path)
            .body(Vec::new())
            .map_err(|e| UsageError::UpstreamProxy(kube::Error::HttpError(e)))?;

        let body = self
            .client
            .request_text(request)
            .await
            .map_err(UsageError::UpstreamProxy)?;

        Ok(body.into_bytes())
    }
}
