//! Remote model API seam.
//!
//! [`CompletionApi`] is the one network call the client makes; everything
//! above it (cache, retry, history) is provider-agnostic. [`HttpTransport`]
//! implements it for OpenAI-compatible endpoints.

mod http;

pub use http::{HttpTransport, DEFAULT_API_BASE};

use async_trait::async_trait;

use crate::request::CompletionRequest;
use crate::types::response::CompletionResponse;
use crate::Result;

#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Submit one request. Implementations classify rate-limit rejections as
    /// [`Error::RateLimited`](crate::Error::RateLimited) and every other
    /// remote failure as [`Error::Transport`](crate::Error::Transport).
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response body: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Other(String),
}
