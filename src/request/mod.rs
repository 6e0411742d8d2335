//! # Request Formatter
//!
//! Builds the provider payload for one call: instance defaults merged with
//! call-level overrides, the prompt (and optional image) wrapped into chat
//! messages, and an optional leading system message.
//!
//! Requests serialize canonically (object keys sorted at every depth), so two
//! requests built through different code paths produce the same cache key.

mod options;

pub use options::{Options, SamplingOptions};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::config::ModelType;
use crate::multimodal::{ImageInput, ImageResolver};
use crate::types::message::{ContentPart, Message, MessageContent, MessageRole};
use crate::{Error, ErrorContext, Result};

/// Override keys that steer the client rather than the provider.
const RESERVED_OPTIONS: &[&str] = &["model_type"];

/// Which remote endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// `/chat/completions` with a `messages` list.
    Chat,
    /// Legacy `/completions` with a `prompt` list.
    Text,
}

/// A fully merged request payload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionRequest {
    options: BTreeMap<String, Value>,
}

impl CompletionRequest {
    pub fn from_options(options: Options) -> Self {
        Self { options }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn model(&self) -> Option<&str> {
        self.options.get("model").and_then(Value::as_str)
    }

    /// Requested number of choices (`n`), defaulting to 1.
    ///
    /// Integral floats such as `2.0` count as integers.
    pub fn n(&self) -> u64 {
        self.options
            .get("n")
            .and_then(|v| {
                v.as_u64().or_else(|| {
                    v.as_f64()
                        .filter(|f| *f >= 1.0 && f.fract() == 0.0)
                        .map(|f| f as u64)
                })
            })
            .unwrap_or(1)
    }

    pub fn shape(&self) -> RequestShape {
        if self.options.contains_key("messages") {
            RequestShape::Chat
        } else {
            RequestShape::Text
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Deterministic serialization: keys sorted recursively, no whitespace.
    pub fn canonical_string(&self) -> String {
        canonicalize(&self.to_json()).to_string()
    }
}

/// Rebuild a JSON value with every object's keys in sorted order.
///
/// `serde_json::Map` keeps insertion order when `preserve_order` is enabled
/// anywhere in the dependency graph, so sorting cannot be left to the map type.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Output of [`RequestFormatter::build`].
#[derive(Debug, Clone)]
pub struct FormattedRequest {
    pub request: CompletionRequest,
    /// Resolved image reference, when an image was supplied.
    pub image_url: Option<String>,
}

/// Builds [`CompletionRequest`]s for one client instance.
pub struct RequestFormatter {
    model_type: ModelType,
    system_prompt: Option<String>,
    defaults: Options,
    resolver: Arc<dyn ImageResolver>,
}

impl RequestFormatter {
    /// `defaults` must already contain the `model` key.
    pub fn new(
        model_type: ModelType,
        system_prompt: Option<String>,
        defaults: Options,
        resolver: Arc<dyn ImageResolver>,
    ) -> Self {
        Self {
            model_type,
            system_prompt,
            defaults,
            resolver,
        }
    }

    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    pub fn build(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
        overrides: &Options,
    ) -> Result<FormattedRequest> {
        let mut options = self.defaults.clone();
        for (k, v) in overrides {
            if RESERVED_OPTIONS.contains(&k.as_str()) {
                continue;
            }
            options.insert(k.clone(), v.clone());
        }

        let image_url = match image {
            Some(input) => Some(self.resolver.resolve(input)?.url),
            None => None,
        };

        match self.model_type {
            ModelType::Chat | ModelType::Vision => {
                let content = match &image_url {
                    Some(url) => MessageContent::parts(vec![
                        ContentPart::text(prompt),
                        ContentPart::image_url(url.clone()),
                    ]),
                    None => MessageContent::text(prompt),
                };
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.is_empty()) {
                    messages.push(Message::system(system));
                }
                messages.push(Message::with_content(MessageRole::User, content));
                options.remove("prompt");
                options.insert("messages".into(), serde_json::to_value(messages)?);
            }
            ModelType::Text => {
                if image_url.is_some() {
                    return Err(Error::invalid_input_with_context(
                        "text completion models do not accept images",
                        ErrorContext::new()
                            .with_field_path("image")
                            .with_source("request_formatter"),
                    ));
                }
                options.remove("messages");
                options.insert("prompt".into(), Value::Array(vec![Value::from(prompt)]));
            }
        }

        Ok(FormattedRequest {
            request: CompletionRequest::from_options(options),
            image_url,
        })
    }
}
