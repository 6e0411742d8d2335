//! # Response Normalizer
//!
//! Turns a raw [`CompletionResponse`] into plain completion strings: drops
//! length-truncated choices when complete ones exist, picks the text field
//! that matches the model type, and optionally ranks choices by their mean
//! token log-probability.

use crate::client::config::ModelType;
use crate::types::response::{Choice, CompletionResponse, END_OF_TEXT};
use crate::{Error, ErrorContext, Result};

/// Per-call normalization switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub only_completed: bool,
    pub return_sorted: bool,
    /// Number of choices requested from the API.
    pub n: u64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            only_completed: true,
            return_sorted: false,
            n: 1,
        }
    }
}

pub fn normalize(
    response: &CompletionResponse,
    model_type: ModelType,
    opts: &NormalizeOptions,
) -> Result<Vec<String>> {
    let mut choices: Vec<&Choice> = response.choices.iter().collect();

    if opts.only_completed {
        let completed: Vec<&Choice> = choices.iter().copied().filter(|c| c.is_completed()).collect();
        if !completed.is_empty() {
            choices = completed;
        }
    }

    if opts.return_sorted && opts.n > 1 {
        let mut scored = Vec::with_capacity(choices.len());
        for (pos, choice) in choices.iter().enumerate() {
            scored.push((mean_logprob(choice, pos)?, choice_text(choice, model_type, pos)?));
        }
        // Stable: equal scores keep response order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        return Ok(scored.into_iter().map(|(_, text)| text).collect());
    }

    choices
        .iter()
        .enumerate()
        .map(|(pos, c)| choice_text(c, model_type, pos))
        .collect()
}

/// Text of one choice: `message.content` for chat-style models, `text` for
/// legacy completion models.
pub fn choice_text(choice: &Choice, model_type: ModelType, pos: usize) -> Result<String> {
    let text = match model_type {
        ModelType::Chat | ModelType::Vision => {
            choice.message.as_ref().and_then(|m| m.content.clone())
        }
        ModelType::Text => choice.text.clone(),
    };
    text.ok_or_else(|| {
        let field = match model_type {
            ModelType::Text => "text",
            _ => "message.content",
        };
        Error::invalid_state_with_context(
            "choice has no completion text",
            ErrorContext::new()
                .with_field_path(format!("choices[{}].{}", pos, field))
                .with_source("response_normalizer"),
        )
    })
}

/// Mean log-probability over the token sequence, cut after the first
/// end-of-text token.
pub fn mean_logprob(choice: &Choice, pos: usize) -> Result<f64> {
    let ctx = || {
        ErrorContext::new()
            .with_field_path(format!("choices[{}].logprobs", pos))
            .with_source("response_normalizer")
    };
    let pairs = choice
        .logprobs
        .as_ref()
        .and_then(|lp| lp.pairs())
        .ok_or_else(|| {
            Error::invalid_state_with_context("choice has no log-probabilities", ctx())
        })?;

    let end = pairs
        .iter()
        .position(|(tok, _)| *tok == END_OF_TEXT)
        .map(|i| i + 1)
        .unwrap_or(pairs.len());
    let scored = &pairs[..end];
    if scored.is_empty() {
        return Err(Error::invalid_state_with_context(
            "choice has an empty log-probability sequence",
            ctx(),
        ));
    }
    let sum: f64 = scored.iter().map(|(_, lp)| lp).sum();
    Ok(sum / scored.len() as f64)
}
