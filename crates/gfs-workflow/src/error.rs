//! Error taxonomy for the transition engine.
//!
//! Every precondition violation is reported before any write is attempted.
//! Only [`ErrorKind::StorageFailure`] is retryable: a failed transaction
//! leaves no partial effect behind, so the caller may repeat the whole call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule enforced by the store rejected a write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    /// A write referenced a row that does not exist inside the transaction.
    #[error("row not found: {0}")]
    MissingRow(String),
    /// A fault armed on [`crate::MemoryStore`] fired.
    #[error("injected fault at {0}")]
    Injected(&'static str),
    /// Connectivity, deadlock, decode or any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Stable label for a [`TransitionError`], used in logs and API bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyApproved,
    NotApproved,
    AlreadyConverted,
    Invalid,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyApproved => "already_approved",
            ErrorKind::NotApproved => "not_approved",
            ErrorKind::AlreadyConverted => "already_converted",
            ErrorKind::Invalid => "invalid",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("quote {quote_id} not found")]
    NotFound { quote_id: i64 },

    /// Idempotency signal: the approval already happened elsewhere.
    #[error("quote {quote_id} is already approved")]
    AlreadyApproved { quote_id: i64 },

    #[error("quote {quote_id} must be approved before conversion to install order")]
    NotApproved { quote_id: i64 },

    #[error("quote {quote_id} has already been converted to install order")]
    AlreadyConverted { quote_id: i64 },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl TransitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransitionError::NotFound { .. } => ErrorKind::NotFound,
            TransitionError::AlreadyApproved { .. } => ErrorKind::AlreadyApproved,
            TransitionError::NotApproved { .. } => ErrorKind::NotApproved,
            TransitionError::AlreadyConverted { .. } => ErrorKind::AlreadyConverted,
            TransitionError::Invalid(_) => ErrorKind::Invalid,
            TransitionError::Storage(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StorageFailure
    }
}
