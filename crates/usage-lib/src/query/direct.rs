//! Direct HTTP transport

use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::QUERY_API_PATH;
use crate::error::{Result, UsageError};

/// Queries Prometheus at a URL reachable from this process
pub struct DirectTransport {
    client: Client,
    base_url: Url,
}

impl DirectTransport {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UsageError::HttpClient)?;

        Ok(Self { client, base_url })
    }

    /// Full query URL; any path prefix on the base URL is kept
    pub fn query_url(&self, promql: &str) -> Url {
        let mut url = self.base_url.clone();
        let path = format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            QUERY_API_PATH
        );
        url.set_path(&path);
        url.set_query(None);
        url.query_pairs_mut().append_pair("query", promql);
        url
    }

    /// Run the query and return the raw body of a 2xx response
    pub async fn fetch(&self, promql: &str) -> Result<Vec<u8>> {
        let url = self.query_url(promql);
        debug!(url = %url, "Querying Prometheus directly");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(UsageError::upstream_http(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(body.to_vec())
    }
}
