use http::StatusCode;

/// Category of a storage error. Lets the caller decide between
/// retrying, fixing its input, or failing fast without matching
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, DNS, TLS or body-read failure.
    Transport,
    /// The service answered with a non-success status.
    Status,
    /// Response or request payload could not be (de)serialized.
    Format,
    /// The caller broke a documented contract.
    Precondition,
    /// Invalid client configuration. Never retryable.
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Status => f.write_str("status"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Precondition => f.write_str("precondition"),
            ErrorKind::Config => f.write_str("config"),
        }
    }
}

/// Unified error type for the table and blob clients.
///
/// Nothing in the clients retries; every error reaches the immediate
/// caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("decode: {0}")]
    Decode(String),

    #[error("encode: {0}")]
    Encode(String),

    #[error("precondition: {0}")]
    EncodingPrecondition(String),

    #[error("filter: {0}")]
    InvalidFilter(String),

    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },
}

impl StorageError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::EncodingPrecondition(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Transport(_) => ErrorKind::Transport,
            StorageError::HttpStatus { .. } => ErrorKind::Status,
            StorageError::Decode(_) | StorageError::Encode(_) => ErrorKind::Format,
            StorageError::EncodingPrecondition(_) | StorageError::InvalidFilter(_) => {
                ErrorKind::Precondition
            }
            StorageError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether a caller-side retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Transport(_) => true,
            StorageError::HttpStatus { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
