//! Vision client: configuration, builder, the call pipeline and its history.
//!
//! Keep the public surface small; implementation details live in the
//! submodules under `src/client/`.

pub mod builder;
pub mod config;
pub mod core;
pub mod history;

pub use builder::VisionClientBuilder;
pub use config::{ClientConfig, ModelType, Settings};
pub use core::{CallOptions, VisionClient};
pub use history::{CallHistory, CallHistoryRecord};
