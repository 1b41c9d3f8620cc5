//! Error types for mempool operations.

use thiserror::Error;
use qnet_state::transaction::TxHash;

#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("transaction already exists: {0}")]
    DuplicateTransaction(TxHash),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("nonce too low: expected >= {expected}, got {got}")]
    NonceTooLow { expected: u64, got: u64 },

    #[error("nonce gap: expected {expected}, got {got}")]
    NonceGap { expected: u64, got: u64 },

    #[error("gas price too low: minimum {min}, got {got}")]
    GasPriceTooLow { min: u64, got: u64 },

    #[error("mempool is full: capacity {capacity}")]
    MempoolFull { capacity: usize },

    #[error("sender transaction limit exceeded: {limit}")]
    SenderLimitExceeded { limit: usize },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("state error: {0}")]
    StateError(#[from] qnet_state::errors::StateError),
}

pub type MempoolResult<T> = Result<T, MempoolError>;
