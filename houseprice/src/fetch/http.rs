//! HTTP fetcher backed by a single shared `reqwest::Client`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Instant;
use tracing::{debug, warn};

use super::protocols::{FetchRequest, FetchResult, Fetcher};
use crate::config::FetchConfig;
use crate::errors::{FetchError, HousePriceError};

/// Fetcher over one connection pool, created once per run.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Builds the client with the configured user agent, timeout and headers.
    pub fn new(config: FetchConfig) -> Result<Self, HousePriceError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .default_headers(header_map(&config.headers))
            .build()
            .map_err(FetchError::from)?;

        Ok(Self { client, config })
    }

    /// Gets the configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn header_map(headers: &std::collections::HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %key, "Skipping invalid header"),
        }
    }
    map
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        let start = Instant::now();

        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .headers(header_map(&request.headers))
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let text = response.text().await?;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            url = %final_url,
            status = status_code,
            bytes = text.len(),
            content_type = %content_type,
            duration_ms,
            "Fetched"
        );

        Ok(FetchResult {
            status_code,
            text,
            final_url,
            duration_ms,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
