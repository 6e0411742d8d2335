use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Option name -> value. Sorted, so iteration order never depends on call site.
pub type Options = BTreeMap<String, Value>;

/// Default sampling parameters applied to every call unless overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub n: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 150,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            n: 1,
        }
    }
}

impl SamplingOptions {
    pub fn to_options(&self) -> Options {
        let mut out = Options::new();
        out.insert("temperature".into(), Value::from(self.temperature));
        out.insert("max_tokens".into(), Value::from(self.max_tokens));
        out.insert("top_p".into(), Value::from(self.top_p));
        out.insert("frequency_penalty".into(), Value::from(self.frequency_penalty));
        out.insert("presence_penalty".into(), Value::from(self.presence_penalty));
        out.insert("n".into(), Value::from(self.n));
        out
    }
}
