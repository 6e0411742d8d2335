use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or option key that caused the error (e.g., "request.image", "choices[1].logprobs")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "image_resolver", "response_normalizer")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the vision client.
///
/// Callers see either a list of completions or one of these; there are no
/// partial results.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote API rejected the call because of rate limiting (HTTP 429).
    #[error("Rate limited by remote API: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u32>,
    },

    #[error("Invalid input: {message}{}", format_context(.context))]
    InvalidInput {
        message: String,
        context: ErrorContext,
    },

    #[error("Invalid state: {message}{}", format_context(.context))]
    InvalidState {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Cache store error: {message}{}", format_context(.context))]
    Cache {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn rate_limited(msg: impl Into<String>, retry_after_ms: Option<u32>) -> Self {
        Error::RateLimited {
            message: msg.into(),
            retry_after_ms,
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::invalid_input_with_context(msg, ErrorContext::new())
    }

    pub fn invalid_input_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidInput {
            message: msg.into(),
            context,
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::invalid_state_with_context(msg, ErrorContext::new())
    }

    pub fn invalid_state_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidState {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn cache_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Cache {
            message: msg.into(),
            context,
        }
    }

    /// Default retry predicate: only rate-limit rejections are worth waiting out.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidInput { context, .. }
            | Error::InvalidState { context, .. }
            | Error::Configuration { context, .. }
            | Error::Cache { context, .. } => Some(context),
            _ => None,
        }
    }
}
