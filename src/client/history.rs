//! Append-only call log owned by one client.

use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::request::{CompletionRequest, Options};
use crate::types::response::CompletionResponse;

fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// One completed call.
#[derive(Debug, Clone)]
pub struct CallHistoryRecord {
    pub request_id: String,
    pub prompt: String,
    /// Resolved image reference (http(s) or `data:` URL) that was embedded.
    pub image_url: Option<String>,
    /// Per-call overrides exactly as the caller passed them.
    pub raw_options: Options,
    /// The merged request that was sent (or served from cache).
    pub request: CompletionRequest,
    pub response: CompletionResponse,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl CallHistoryRecord {
    pub fn new(
        prompt: impl Into<String>,
        image_url: Option<String>,
        raw_options: Options,
        request: CompletionRequest,
        response: CompletionResponse,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            image_url,
            raw_options,
            request,
            response,
            timestamp: timestamp(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CallHistory {
    records: RwLock<Vec<CallHistoryRecord>>,
}

impl CallHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: CallHistoryRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
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

    pub fn snapshot(&self) -> Vec<CallHistoryRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The last `n` records, oldest first.
    pub fn last(&self, n: usize) -> Vec<CallHistoryRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let start = records.len().saturating_sub(n);
        records[start..].to_vec()
    }
}
