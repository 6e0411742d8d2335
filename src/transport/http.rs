use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Proxy, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{CompletionApi, TransportError};
use crate::request::{CompletionRequest, RequestShape};
use crate::types::response::CompletionResponse;
use crate::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible HTTP client for chat and legacy completion endpoints.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<String>,
        timeout: Duration,
        proxy: Option<&str>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, shape: RequestShape) -> String {
        match shape {
            RequestShape::Chat => format!("{}/chat/completions", self.base_url),
            RequestShape::Text => format!("{}/completions", self.base_url),
        }
    }

    /// Only the `Retry-After: <seconds>` form is understood.
    fn retry_after_ms(headers: &HeaderMap) -> Option<u32> {
        let raw = headers.get("retry-after")?.to_str().ok()?.trim();
        let secs: u32 = raw.parse().ok()?;
        Some(secs.saturating_mul(1000))
    }
}

#[async_trait]
impl CompletionApi for HttpTransport {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = self.endpoint(request.shape());
        let start = Instant::now();

        let mut req = self.client.post(&url).json(&request.to_json());
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(TransportError::Http)?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = Self::retry_after_ms(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            info!(
                http_status = status.as_u16(),
                endpoint = url.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "completion request rate limited"
            );
            return Err(Error::rate_limited(body, retry_after_ms));
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            info!(
                http_status = status.as_u16(),
                endpoint = url.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "completion request failed"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = resp.bytes().await.map_err(TransportError::Http)?;
        let parsed: CompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        debug!(
            endpoint = url.as_str(),
            choices = parsed.choices.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "completion request succeeded"
        );
        Ok(parsed)
    }
}
