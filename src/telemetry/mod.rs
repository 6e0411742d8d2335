//! Usage accounting and log initialization.
//!
//! Token usage is only reported when the caller opts in through
//! [`Settings::log_usage`](crate::client::Settings). Where it goes is decided
//! by the injected [`UsageSink`].
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`UsageSink`] | Trait for usage destinations |
//! | [`NoopUsageSink`] | Default sink, drops everything |
//! | [`TracingUsageSink`] | Emits one `info` event per call |
//! | [`FileUsageSink`] | Appends `total_tokens` lines to a file |
//! | [`InMemoryUsageSink`] | Keeps records for inspection in tests |

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::types::response::Usage;
use crate::{Error, ErrorContext, Result};

/// Default file name used by [`FileUsageSink::default`].
pub const DEFAULT_USAGE_LOG: &str = "openai_usage.log";

#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, usage: &Usage) -> Result<()>;
}

pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _usage: &Usage) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn UsageSink> {
    Arc::new(NoopUsageSink)
}

pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, usage: &Usage) -> Result<()> {
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "token usage"
        );
        Ok(())
    }
}

/// Appends one `<total_tokens>` line per call.
pub struct FileUsageSink {
    path: PathBuf,
}

impl FileUsageSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileUsageSink {
    fn default() -> Self {
        Self::new(DEFAULT_USAGE_LOG)
    }
}

#[async_trait]
impl UsageSink for FileUsageSink {
    async fn record(&self, usage: &Usage) -> Result<()> {
        let ctx = || {
            ErrorContext::new()
                .with_field_path(self.path.display().to_string())
                .with_source("file_usage_sink")
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::configuration_with_context(e.to_string(), ctx()))?;
        file.write_all(format!("{}\n", usage.total_tokens).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }
}

pub struct InMemoryUsageSink {
    records: RwLock<Vec<Usage>>,
}

impl InMemoryUsageSink {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<Usage> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total_tokens(&self) -> u64 {
        self.records().iter().map(|u| u.total_tokens).sum()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryUsageSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageSink for InMemoryUsageSink {
    async fn record(&self, usage: &Usage) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*usage);
        Ok(())
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG` (default `vision_lm=info`).
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vision_lm=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
