use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::TwoTierCache;
use crate::client::config::{ClientConfig, ModelType, Settings};
use crate::client::history::{CallHistory, CallHistoryRecord};
use crate::multimodal::ImageInput;
use crate::request::{CompletionRequest, Options, RequestFormatter};
use crate::resilience::RetryPolicy;
use crate::response::{normalize, NormalizeOptions};
use crate::telemetry::UsageSink;
use crate::transport::CompletionApi;
use crate::types::response::CompletionResponse;
use crate::Result;

/// Per-call switches for [`VisionClient::call`].
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    /// Drop length-truncated choices when at least one choice completed.
    pub only_completed: bool,
    /// Rank choices by mean token log-probability (only when `n > 1`).
    pub return_sorted: bool,
    /// Request options overriding the client defaults for this call.
    pub overrides: Options,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            only_completed: true,
            return_sorted: false,
            overrides: Options::new(),
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn sorted(mut self) -> Self {
        self.return_sorted = true;
        self
    }

    pub fn keep_truncated(mut self) -> Self {
        self.only_completed = false;
        self
    }
}

/// Vision-language model client.
///
/// `call` = format -> (retry around (cache lookup or remote call)) -> normalize.
pub struct VisionClient {
    pub(crate) config: ClientConfig,
    pub(crate) settings: Settings,
    pub(crate) formatter: RequestFormatter,
    pub(crate) cache: Arc<TwoTierCache>,
    pub(crate) api: Arc<dyn CompletionApi>,
    pub(crate) retry: RetryPolicy,
    pub(crate) usage_sink: Arc<dyn UsageSink>,
    pub(crate) history: CallHistory,
}

impl VisionClient {
    pub fn builder() -> crate::client::VisionClientBuilder {
        crate::client::VisionClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn model_type(&self) -> ModelType {
        self.config.model_type
    }

    pub fn cache(&self) -> &Arc<TwoTierCache> {
        &self.cache
    }

    pub fn history(&self) -> &CallHistory {
        &self.history
    }

    /// One formatted request through the cache, without retry.
    ///
    /// Appends a history record when a response is obtained.
    pub async fn basic_request(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
        overrides: &Options,
    ) -> Result<CompletionResponse> {
        self.execute(prompt, image, overrides)
            .await
            .map(|(_, response)| response)
    }

    /// [`basic_request`](Self::basic_request) under the retry policy.
    pub async fn request(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
        overrides: &Options,
    ) -> Result<CompletionResponse> {
        self.execute_with_retry(prompt, image, overrides)
            .await
            .map(|(_, response)| response)
    }

    /// Full pipeline: returns the normalized completion strings.
    pub async fn call(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
        opts: &CallOptions,
    ) -> Result<Vec<String>> {
        let (request, response) = self
            .execute_with_retry(prompt, image, &opts.overrides)
            .await?;

        if self.settings.log_usage {
            if let Some(usage) = &response.usage {
                if let Err(e) = self.usage_sink.record(usage).await {
                    warn!(error = %e, "failed to record token usage");
                }
            }
        }

        normalize(
            &response,
            self.config.model_type,
            &NormalizeOptions {
                only_completed: opts.only_completed,
                return_sorted: opts.return_sorted,
                n: request.n(),
            },
        )
    }

    async fn execute(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
        overrides: &Options,
    ) -> Result<(CompletionRequest, CompletionResponse)> {
        let formatted = self.formatter.build(prompt, image, overrides)?;
        let request = &formatted.request;

        let response = self
            .cache
            .get_or_compute(request, || self.api.complete(request))
            .await?;

        let record = CallHistoryRecord::new(
            prompt,
            formatted.image_url,
            overrides.clone(),
            formatted.request.clone(),
            response.clone(),
        );
        debug!(
            request_id = record.request_id.as_str(),
            choices = response.choices.len(),
            "completion recorded"
        );
        self.history.push(record);
        Ok((formatted.request, response))
    }

    async fn execute_with_retry(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
        overrides: &Options,
    ) -> Result<(CompletionRequest, CompletionResponse)> {
        let params = Value::Object(
            overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        self.retry
            .run("basic_request", &params, || {
                self.execute(prompt, image, overrides)
            })
            .await
    }

    /// Human-readable dump of the last `n` calls.
    pub fn inspect_history(&self, n: usize) -> String {
        let mut out = String::new();
        for record in self.history.last(n) {
            let _ = writeln!(out, "[{}] {}", record.request_id, record.prompt);
            if let Some(url) = &record.image_url {
                let _ = writeln!(out, "  <image {}>", abbreviate(url, 48));
            }
            for (i, choice) in record.response.choices.iter().enumerate() {
                let text = match self.config.model_type {
                    ModelType::Text => choice.text.as_deref(),
                    ModelType::Chat | ModelType::Vision => {
                        choice.message.as_ref().and_then(|m| m.content.as_deref())
                    }
                };
                let _ = writeln!(out, "  {}: {}", i, text.unwrap_or("<no text>"));
            }
        }
        out
    }
}

fn abbreviate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, MemoryStore};
    use crate::client::VisionClientBuilder;
    use crate::Error;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionApi for EchoApi {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = request.n();
            let choices: Vec<Value> = (0..n)
                .map(|i| {
                    json!({
                        "index": i,
                        "finish_reason": "stop",
                        "message": {"role": "assistant", "content": format!("answer {}", i)}
                    })
                })
                .collect();
            Ok(serde_json::from_value(json!({
                "choices": choices,
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            }))?)
        }
    }

    fn client(api: Arc<EchoApi>) -> VisionClient {
        let cache = TwoTierCache::new(&CacheConfig::default(), Arc::new(MemoryStore::new()));
        VisionClientBuilder::new()
            .with_api(api)
            .with_cache(Arc::new(cache))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_call_and_history() {
        let api = Arc::new(EchoApi {
            calls: AtomicUsize::new(0),
        });
        let client = client(api.clone());

        let out = client
            .call("what is this?", None, &CallOptions::new().with_option("n", 2))
            .await
            .unwrap();
        assert_eq!(out, vec!["answer 0", "answer 1"]);
        assert_eq!(client.history().len(), 1);

        let record = &client.history().snapshot()[0];
        assert_eq!(record.raw_options.get("n"), Some(&json!(2)));
        assert_eq!(record.request.n(), 2);

        let dump = client.inspect_history(1);
        assert!(dump.contains("what is this?"));
        assert!(dump.contains("1: answer 1"));
    }

    #[tokio::test]
    async fn test_cached_call_still_appends_history() {
        let api = Arc::new(EchoApi {
            calls: AtomicUsize::new(0),
        });
        let client = client(api.clone());
        client.call("same", None, &CallOptions::new()).await.unwrap();
        client.call("same", None, &CallOptions::new()).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.history().len(), 2);
    }

    #[tokio::test]
    async fn test_formatting_errors_are_not_retried_or_recorded() {
        let api = Arc::new(EchoApi {
            calls: AtomicUsize::new(0),
        });
        let client = client(api.clone());
        let bad = ImageInput::Bytes(Vec::new());
        let err = client
            .call("x", Some(&bad), &CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert!(client.history().is_empty());
    }

    struct LogprobApi;

    #[async_trait]
    impl CompletionApi for LogprobApi {
        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            Ok(serde_json::from_value(json!({
                "choices": [
                    {"index": 0, "finish_reason": "stop",
                     "message": {"role": "assistant", "content": "unlikely"},
                     "logprobs": {"content": [{"token": "u", "logprob": -3.0}]}},
                    {"index": 1, "finish_reason": "stop",
                     "message": {"role": "assistant", "content": "likely"},
                     "logprobs": {"content": [{"token": "l", "logprob": -0.1}]}}
                ]
            }))?)
        }
    }

    #[tokio::test]
    async fn test_float_n_override_still_sorts() {
        let cache = TwoTierCache::new(&CacheConfig::default(), Arc::new(MemoryStore::new()));
        let client = VisionClientBuilder::new()
            .with_api(Arc::new(LogprobApi))
            .with_cache(Arc::new(cache))
            .build()
            .unwrap();

        let out = client
            .call("rank", None, &CallOptions::new().with_option("n", 2.0).sorted())
            .await
            .unwrap();
        assert_eq!(out, vec!["likely", "unlikely"]);
    }

    #[tokio::test]
    async fn test_text_only_call_records_no_image() {
        let api = Arc::new(EchoApi {
            calls: AtomicUsize::new(0),
        });
        let client = client(api);
        client.call("plain", None, &CallOptions::new()).await.unwrap();
        assert!(client.history().snapshot()[0].image_url.is_none());
        assert!(!client.inspect_history(1).contains("<image"));
    }

    #[test]
    fn test_abbreviate_respects_char_boundaries() {
        assert_eq!(abbreviate("short", 48), "short");
        assert_eq!(abbreviate("data:image/png;base64,AAAA", 10), "data:image...");
        assert_eq!(abbreviate("\u{e9}\u{e9}\u{e9}", 2), "\u{e9}\u{e9}...");
    }
}
