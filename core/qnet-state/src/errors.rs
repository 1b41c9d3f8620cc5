//! Error types for state management.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("other error: {0}")]
    Other(String),
}

impl From<String> for StateError {
    fn from(s: String) -> Self {
        StateError::Other(s)
    }
}

pub type StateResult<T> = Result<T, StateError>;
