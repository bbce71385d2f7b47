//! Error types for the ledger

use crate::types::UserId;
use thiserror::Error;

/// Errors that can occur while decoding or applying events
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Malformed event envelope: {0}")]
    Decode(String),

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Debt change for user {0} is out of range")]
    DebtOverflow(UserId),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
