use thiserror::Error;

/// Maximum number of characters of a response body kept in an API error.
pub const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid JSON in response: {0}")]
    Parse(String),

    // =========================================================================
    // Output Errors
    // =========================================================================
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize output: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an API error, keeping only the head of the response body.
    pub fn api(status: u16, body: &str) -> Self {
        Error::Api {
            status,
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        }
    }

    /// True for failures of a single request (transport, HTTP status, bad JSON).
    ///
    /// Exporters skip a per-item detail when this holds; anything else aborts.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Api { .. } | Error::Parse(_)
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
