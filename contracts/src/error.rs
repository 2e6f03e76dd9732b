//! Errors returned by asset contract operations.

use gemledger_protocol::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// No record exists at `(kind, owner)`.
    #[error("the asset {kind}/{owner} does not exist")]
    NotFound { kind: String, owner: String },

    /// A record already exists at `(kind, owner)`.
    #[error("the asset {kind}/{owner} already exists")]
    AlreadyExists { kind: String, owner: String },

    #[error("insufficient {kind} balance for {owner}: has {available}, needs {requested}")]
    InsufficientBalance {
        kind: String,
        owner: String,
        available: u64,
        requested: u64,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The dispatcher does not know the requested function name.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A stored record could not be decoded, or a record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Passed through from the world state.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// True when the invocation lost an optimistic concurrency race and can
    /// be re-run from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_conflict())
    }

    /// Stable machine-readable name of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "NotFound",
            LedgerError::AlreadyExists { .. } => "AlreadyExists",
            LedgerError::InsufficientBalance { .. } => "InsufficientBalance",
            LedgerError::InvalidArgument(_) => "InvalidArgument",
            LedgerError::UnknownFunction(_) => "UnknownFunction",
            LedgerError::Serialization(_) => "SerializationError",
            LedgerError::Store(e) if e.is_conflict() => "Conflict",
            LedgerError::Store(_) => "StoreError",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
