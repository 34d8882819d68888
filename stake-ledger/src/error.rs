//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Amount is zero, negative, overflowing or exceeds the available balance
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Query window outside the accepted range
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Wallet has never been observed
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Admin authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Signature or key could not be decoded or did not verify
    #[error("Signature verification failed: {0}")]
    SignatureError(String),

    /// A required server-side secret or setting is absent
    #[error("Server misconfigured: {0}")]
    ServerMisconfigured(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Stable, client-facing error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Client error: malformed, missing or out-of-range input
    InvalidRequest,
    /// Authentication or authorization failure on the admin path
    Unauthorized,
    /// Referenced wallet does not exist
    NotFound,
    /// Required server-side secret or config absent
    ServerMisconfigured,
    /// Transactional persistence error
    StoreFailure,
    /// Anything unexpected
    InternalError,
}

impl ErrorCategory {
    /// Snake-case identifier used in JSON error bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidRequest => "invalid_request",
            ErrorCategory::Unauthorized => "unauthorized",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::ServerMisconfigured => "server_misconfigured",
            ErrorCategory::StoreFailure => "store_failure",
            ErrorCategory::InternalError => "internal_error",
        }
    }
}

impl Error {
    /// Map onto the client-facing taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidRequest(_) | Error::InvalidAmount(_) | Error::InvalidRange(_) => {
                ErrorCategory::InvalidRequest
            }
            Error::WalletNotFound(_) => ErrorCategory::NotFound,
            Error::Unauthorized(_) | Error::SignatureError(_) => ErrorCategory::Unauthorized,
            Error::ServerMisconfigured(_) | Error::Config(_) => ErrorCategory::ServerMisconfigured,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => {
                ErrorCategory::StoreFailure
            }
            Error::Concurrency(_) | Error::Other(_) => ErrorCategory::InternalError,
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
