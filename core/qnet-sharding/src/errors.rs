//! Error types for the shard coordinator.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShardError {
    #[error("shard {0} not found")]
    ShardNotFound(u32),
    #[error("shard {0} not managed by this node")]
    ShardNotManaged(u32),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("cross-shard transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },
    #[error("not a cross-shard transaction")]
    NotCrossShardTransaction,
    #[error("cross-shard queue full (max {0})")]
    QueueFull(usize),
}

pub type ShardResult<T> = Result<T, ShardError>;
