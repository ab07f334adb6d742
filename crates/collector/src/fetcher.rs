use bytes::Bytes;
use power_models::{MonitorConfig, MonitorError};
use reqwest::{header, Client, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Shared HTTP client for every queue source.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
    min_capacity_mw: f64,
}

impl Fetcher {
    pub fn new(config: &MonitorConfig) -> Result<Self, MonitorError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        // Several operators serve incomplete certificate chains.
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| MonitorError::ConfigError {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            backoff_base_secs: config.backoff_base_secs,
            min_capacity_mw: config.min_capacity_mw,
        })
    }

    pub fn min_capacity_mw(&self) -> f64 {
        self.min_capacity_mw
    }

    /// Sends a GET, retrying transport failures with exponential backoff.
    /// Non-success statuses are returned as `Upstream` errors without retrying.
    pub async fn get(
        &self,
        source: &str,
        url: &str,
        referer: Option<&str>,
    ) -> Result<Response, MonitorError> {
        let mut attempt: u32 = 0;
        let response = loop {
            let mut request = self.client.get(url);
            if let Some(referer) = referer {
                request = request.header(header::REFERER, referer);
            }
            match request.send().await {
                Ok(response) => break response,
                Err(e) if attempt + 1 < self.max_retries => {
                    let wait = Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt));
                    warn!(
                        source = %source,
                        url = %url,
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(MonitorError::upstream(source, e)),
            }
        };

        let status = response.status();
        debug!(source = %source, url = %url, status = %status, "Fetched");
        if !status.is_success() {
            return Err(MonitorError::upstream(source, format!("{url} returned HTTP {status}")));
        }
        Ok(response)
    }

    pub async fn bytes(&self, source: &str, url: &str) -> Result<Bytes, MonitorError> {
        self.bytes_with_referer(source, url, None).await
    }

    /// Some publishers reject downloads that do not come from their landing page.
    pub async fn bytes_with_referer(
        &self,
        source: &str,
        url: &str,
        referer: Option<&str>,
    ) -> Result<Bytes, MonitorError> {
        self.get(source, url, referer)
            .await?
            .bytes()
            .await
            .map_err(|e| MonitorError::upstream(source, e))
    }

    pub async fn text(&self, source: &str, url: &str) -> Result<String, MonitorError> {
        self.get(source, url, None)
            .await?
            .text()
            .await
            .map_err(|e| MonitorError::upstream(source, e))
    }

    pub async fn json(&self, source: &str, url: &str) -> Result<serde_json::Value, MonitorError> {
        let body = self.bytes(source, url).await?;
        serde_json::from_slice(&body).map_err(|e| MonitorError::parse(source, e))
    }
}
