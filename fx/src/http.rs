//! HTTP rate fetcher.

use std::time::Duration;

use async_trait::async_trait;
use ratewise_common::Currency;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{FxError, FxResult};
use crate::fetcher::{RateFetcher, RawRates};

/// Default public endpoint; the base code is appended as the last path segment.
pub const DEFAULT_ENDPOINT: &str = "https://api.exchangerate-api.com/v4/latest";

/// Fetches `{endpoint}/{BASE}` and decodes the JSON body.
pub struct HttpRateFetcher {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpRateFetcher {
    /// Create a fetcher. `timeout` is also applied at the client level.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::FetchTransport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// Create a fetcher around an already configured client.
    pub fn with_client(client: Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Request URL for `base`.
    pub fn url_for(&self, base: &Currency) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), base.code())
    }

    fn map_send_error(&self, base: &Currency, e: reqwest::Error) -> FxError {
        if e.is_timeout() {
            FxError::FetchTimeout {
                base: base.clone(),
                timeout: self.timeout,
            }
        } else {
            FxError::FetchTransport(format!("HTTP request failed: {}", e))
        }
    }
}

#[async_trait]
impl RateFetcher for HttpRateFetcher {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base = %base))]
    async fn fetch(&self, base: &Currency) -> FxResult<RawRates> {
        let url = self.url_for(base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(base, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::FetchTransport(format!(
                "{} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(base, e))?;
        debug!(bytes = body.len(), "Received rate payload");

        RawRates::from_json(&body)
    }
}
