//! r2r-mcp error types

/// r2r-mcp error types
#[derive(Debug, thiserror::Error)]
pub enum R2rError {
    // Caller errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded for '{client}': max {limit} requests per minute")]
    RateLimitExceeded { client: String, limit: u32 },

    // Upstream/network errors
    #[error("HTTP error {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("transport error: {0}")]
    Http(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl R2rError {
    /// Whether the retry stage may attempt the call again.
    ///
    /// Upstream 5xx responses and non-HTTP failures are retried; 4xx
    /// responses, caller errors and rate limiting are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            R2rError::UpstreamHttp { status, .. } => *status >= 500,
            R2rError::Http(_) | R2rError::Json(_) | R2rError::Unexpected(_) => true,
            R2rError::InvalidArgument(_)
            | R2rError::NotFound(_)
            | R2rError::RateLimitExceeded { .. }
            | R2rError::Io(_)
            | R2rError::Configuration(_) => false,
        }
    }

    /// Stable label used as the error-kind half of the error tally key.
    pub fn kind(&self) -> String {
        match self {
            R2rError::UpstreamHttp { status, .. } => format!("HTTP{status}"),
            R2rError::InvalidArgument(_) => "InvalidArgument".to_string(),
            R2rError::NotFound(_) => "NotFound".to_string(),
            R2rError::RateLimitExceeded { .. } => "RateLimitExceeded".to_string(),
            R2rError::Http(_) => "Transport".to_string(),
            R2rError::Json(_) => "Json".to_string(),
            R2rError::Io(_) => "Io".to_string(),
            R2rError::Configuration(_) => "Configuration".to_string(),
            R2rError::Unexpected(_) => "Unexpected".to_string(),
        }
    }

    /// HTTP status used by the REST facade when this error is terminal.
    pub fn status_code(&self) -> u16 {
        match self {
            R2rError::NotFound(_) => 404,
            R2rError::UpstreamHttp { status: 404, .. } => 404,
            R2rError::InvalidArgument(_) => 400,
            R2rError::RateLimitExceeded { .. } => 429,
            _ => 500,
        }
    }

    /// JSON-RPC error code used by the MCP surface.
    pub fn jsonrpc_code(&self) -> i32 {
        match self {
            R2rError::RateLimitExceeded { .. } => -32000,
            R2rError::InvalidArgument(_) => -32602,
            R2rError::NotFound(_) => -32601,
            _ => -32603,
        }
    }
}

impl From<reqwest::Error> for R2rError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            R2rError::Http(format!("request timed out: {err}"))
        } else {
            R2rError::Http(err.to_string())
        }
    }
}

/// Result type alias for r2r-mcp operations
pub type Result<T> = std::result::Result<T, R2rError>;
