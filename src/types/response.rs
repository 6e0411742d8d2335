//! Raw completion response returned by the remote API.
//!
//! Only the fields the normalizer reads are typed; everything else the
//! provider sends is kept in `extra` so cached entries stay faithful to the
//! original payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Finish indicator the API uses when generation was cut off by `max_tokens`.
pub const FINISH_REASON_LENGTH: &str = "length";

/// End-of-text marker that terminates a scored token sequence.
pub const END_OF_TEXT: &str = "<|endoftext|>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Chat-style payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChoiceMessage>,
    /// Legacy completion-style payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Logprobs>,
}

impl Choice {
    /// A choice is completed unless the API truncated it for length.
    pub fn is_completed(&self) -> bool {
        self.finish_reason.as_deref() != Some(FINISH_REASON_LENGTH)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Token log-probabilities in either of the two shapes providers emit.
///
/// Legacy completions use parallel `tokens` / `token_logprobs` arrays; chat
/// completions use `content: [{token, logprob}]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Logprobs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_logprobs: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<TokenLogprob>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
}

impl Logprobs {
    /// Flatten into `(token, logprob)` pairs. `None` when neither shape is
    /// present or a legacy entry is null.
    pub fn pairs(&self) -> Option<Vec<(&str, f64)>> {
        if let (Some(tokens), Some(lps)) = (&self.tokens, &self.token_logprobs) {
            return tokens
                .iter()
                .zip(lps.iter())
                .map(|(t, lp)| lp.map(|lp| (t.as_str(), lp)))
                .collect();
        }
        self.content
            .as_ref()
            .map(|c| c.iter().map(|t| (t.token.as_str(), t.logprob)).collect())
    }
}

/// Token accounting reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_chat_completion_and_keeps_extra_fields() {
        let raw = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "finish_reason": "stop", "message": {"role": "assistant", "content": "a cat"}}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        });
        let resp: CompletionResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(resp.choices.len(), 1);
        assert_eq!(resp.usage.unwrap().total_tokens, 12);
        assert_eq!(resp.extra.get("id"), Some(&json!("chatcmpl-1")));
        assert_eq!(serde_json::to_value(&resp).unwrap(), raw);
    }

    #[test]
    fn test_is_completed() {
        let mut c: Choice = serde_json::from_value(json!({"finish_reason": "length"})).unwrap();
        assert!(!c.is_completed());
        c.finish_reason = Some("stop".into());
        assert!(c.is_completed());
        c.finish_reason = None;
        assert!(c.is_completed());
    }

    #[test]
    fn test_logprob_pairs_from_both_shapes() {
        let legacy = Logprobs {
            tokens: Some(vec!["a".into(), "b".into()]),
            token_logprobs: Some(vec![Some(-0.5), Some(-1.5)]),
            content: None,
        };
        assert_eq!(legacy.pairs().unwrap(), vec![("a", -0.5), ("b", -1.5)]);

        let chat: Logprobs = serde_json::from_value(json!({
            "content": [{"token": "x", "logprob": -0.25}]
        }))
        .unwrap();
        assert_eq!(chat.pairs().unwrap(), vec![("x", -0.25)]);

        let nulls = Logprobs {
            tokens: Some(vec!["a".into()]),
            token_logprobs: Some(vec![None]),
            content: None,
        };
        assert!(nulls.pairs().is_none());
        assert!(Logprobs::default().pairs().is_none());
    }
}
