//! # vision-lm
//!
//! Adapter between a prompting framework and a remote vision-language model
//! API. A call formats a prompt (plus an optional image) into a completion
//! request, serves it from a two-tier cache or the network, retries rate-limit
//! rejections with exponential backoff, and normalizes the returned choices
//! into plain strings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vision_lm::{CallOptions, ImageInput, VisionClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> vision_lm::Result<()> {
//!     vision_lm::telemetry::init_tracing();
//!
//!     let client = VisionClientBuilder::new()
//!         .with_model("gpt-4-vision-preview")
//!         .build()?;
//!
//!     let image = ImageInput::from(std::path::PathBuf::from("cat.png"));
//!     let answers = client
//!         .call("What animal is this?", Some(&image), &CallOptions::new())
//!         .await?;
//!     println!("{}", answers[0]);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Configuration, builder, call pipeline and history |
//! | [`request`] | Request formatter and canonical request serialization |
//! | [`cache`] | Persistent store under an in-process memo |
//! | [`resilience`] | Retry policy for rate-limited calls |
//! | [`response`] | Completion filtering and log-probability ranking |
//! | [`multimodal`] | Image resolution to embeddable URLs |
//! | [`transport`] | Remote API seam and its HTTP implementation |
//! | [`telemetry`] | Usage sinks and log initialization |
//! | [`types`] | Wire types for messages and responses |

pub mod cache;
pub mod client;
pub mod multimodal;
pub mod request;
pub mod resilience;
pub mod response;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use client::{CallOptions, ClientConfig, ModelType, Settings, VisionClient, VisionClientBuilder};
pub use multimodal::ImageInput;
pub use types::{
    message::{Message, MessageRole},
    response::CompletionResponse,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
