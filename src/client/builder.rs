use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheConfig, TwoTierCache};
use crate::client::config::{ClientConfig, Settings};
use crate::client::core::VisionClient;
use crate::client::history::CallHistory;
use crate::multimodal::{DataUrlResolver, ImageResolver};
use crate::request::RequestFormatter;
use crate::resilience::RetryPolicy;
use crate::telemetry::UsageSink;
use crate::transport::{CompletionApi, HttpTransport};
use crate::Result;

/// Keyring service under which API keys are looked up.
pub const KEYRING_SERVICE: &str = "vision-lm";
const KEYRING_USER: &str = "openai";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Builder for [`VisionClient`].
///
/// Every collaborator has a default; override only what a test or deployment
/// needs. Several clients may share one cache by passing the same
/// `Arc<TwoTierCache>`.
pub struct VisionClientBuilder {
    config: ClientConfig,
    settings: Settings,
    cache: Option<Arc<TwoTierCache>>,
    api: Option<Arc<dyn CompletionApi>>,
    resolver: Arc<dyn ImageResolver>,
    retry: RetryPolicy,
    usage_sink: Arc<dyn UsageSink>,
}

impl VisionClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            settings: Settings::default(),
            cache: None,
            api: None,
            resolver: Arc::new(DataUrlResolver),
            retry: RetryPolicy::default(),
            usage_sink: crate::telemetry::noop_sink(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Point the HTTP transport somewhere else, e.g. a mock server.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = Some(base.into());
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing cache. Default is a disk cache built from
    /// [`CacheConfig::default`].
    pub fn with_cache(mut self, cache: Arc<TwoTierCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_config(mut self, config: &CacheConfig) -> Self {
        self.cache = Some(Arc::new(TwoTierCache::from_config(config)));
        self
    }

    /// Replace the HTTP transport entirely. The API key is not resolved in
    /// that case.
    pub fn with_api(mut self, api: Arc<dyn CompletionApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_image_resolver(mut self, resolver: Arc<dyn ImageResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Inject a usage sink. Default is a no-op sink; it is only consulted
    /// when [`Settings::log_usage`] is on.
    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage_sink = sink;
        self
    }

    pub fn build(self) -> Result<VisionClient> {
        self.config.validate()?;

        let api = match self.api {
            Some(api) => api,
            None => {
                let api_key = self.config.api_key.clone().or_else(resolve_api_key);
                if api_key.is_none() {
                    debug!("no API key found, requests will be sent unauthenticated");
                }
                Arc::new(HttpTransport::new(
                    self.config.api_base.as_deref(),
                    api_key,
                    Duration::from_secs(self.config.timeout_secs),
                    self.config.proxy.as_deref(),
                )?)
            }
        };

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(TwoTierCache::from_config(&CacheConfig::default())));

        let formatter = RequestFormatter::new(
            self.config.model_type,
            self.config.system_prompt.clone(),
            self.config.default_options(),
            self.resolver,
        );

        debug!(
            model = self.config.model.as_str(),
            model_type = self.config.model_type.as_str(),
            log_usage = self.settings.log_usage,
            "vision client built"
        );

        Ok(VisionClient {
            config: self.config,
            settings: self.settings,
            formatter,
            cache,
            api,
            retry: self.retry,
            usage_sink: self.usage_sink,
            history: CallHistory::new(),
        })
    }
}

impl Default for VisionClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyring first, then `OPENAI_API_KEY`.
fn resolve_api_key() -> Option<String> {
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        if let Ok(key) = entry.get_password() {
            return Some(key);
        }
    }
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
}
