//! Client configuration values.
//!
//! Nothing here reads ambient state implicitly: environment lookups only
//! happen in the `from_env` constructors.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::request::{Options, SamplingOptions};
use crate::{Error, ErrorContext, Result};

pub const DEFAULT_MODEL: &str = "gpt-4-vision-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which response shape the remote model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Chat,
    /// Legacy prompt-in, text-out completions.
    Text,
    #[default]
    Vision,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Chat => "chat",
            ModelType::Text => "text",
            ModelType::Vision => "vision",
        }
    }
}

impl std::str::FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(ModelType::Chat),
            "text" => Ok(ModelType::Text),
            "vision" => Ok(ModelType::Vision),
            other => Err(Error::configuration_with_context(
                format!("unknown model type '{}'", other),
                ErrorContext::new()
                    .with_field_path("model_type")
                    .with_details("expected one of: chat, text, vision"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub model: String,
    /// Never written back out when the config is serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model_type: ModelType,
    pub system_prompt: Option<String>,
    pub defaults: SamplingOptions,
    /// Provider-specific options merged after `defaults`.
    pub extra: Options,
    pub timeout_secs: u64,
    pub proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: None,
            model_type: ModelType::default(),
            system_prompt: None,
            defaults: SamplingOptions::default(),
            extra: Options::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy: None,
        }
    }
}

impl ClientConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Parse YAML (and therefore JSON) configuration text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid client configuration: {}", e),
                ErrorContext::new().with_source("client_config"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read client configuration: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("client_config"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "model must not be empty",
                ErrorContext::new().with_field_path("model"),
            ));
        }
        if let Some(base) = &self.api_base {
            let parsed = url::Url::parse(base).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid api_base '{}': {}", base, e),
                    ErrorContext::new().with_field_path("api_base"),
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::configuration_with_context(
                    format!("unsupported api_base scheme '{}'", parsed.scheme()),
                    ErrorContext::new().with_field_path("api_base"),
                ));
            }
        }
        if self.timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "timeout_secs must be positive",
                ErrorContext::new().with_field_path("timeout_secs"),
            ));
        }
        Ok(())
    }

    /// Instance defaults handed to the request formatter: sampling options,
    /// then `extra`, then `model`.
    pub fn default_options(&self) -> Options {
        let mut options = self.defaults.to_options();
        for (k, v) in &self.extra {
            options.insert(k.clone(), v.clone());
        }
        options.insert("model".into(), self.model.clone().into());
        options
    }
}

/// Process-level switches passed explicitly to the builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Report token usage to the configured usage sink after each call.
    pub log_usage: bool,
}

impl Settings {
    /// Reads `VISION_LM_LOG_USAGE` (`1`/`true`/`on`).
    pub fn from_env() -> Self {
        let log_usage = std::env::var("VISION_LM_LOG_USAGE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on"))
            .unwrap_or(false);
        Self { log_usage }
    }

    pub fn with_log_usage(mut self, enabled: bool) -> Self {
        self.log_usage = enabled;
        self
    }
}
