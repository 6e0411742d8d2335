//! # Types Module
//!
//! Wire types shared by the formatter, the transport, the cache and the
//! normalizer.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`message`] | Chat messages with text and image content parts |
//! | [`response`] | Raw completion response, choices, log-probabilities and usage |

pub mod message;
pub mod response;

pub use message::{ContentPart, ImageUrl, Message, MessageContent, MessageRole};
pub use response::{Choice, ChoiceMessage, CompletionResponse, Logprobs, TokenLogprob, Usage};
