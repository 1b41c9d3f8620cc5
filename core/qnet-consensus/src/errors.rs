//! Error types for the consensus crate.

use thiserror::Error;

use crate::reputation::BanRequest;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConsensusError {
    #[error("invalid commit: {0}")]
    InvalidCommit(String),
    #[error("invalid reveal: {0}")]
    InvalidReveal(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("wrong phase: {0}")]
    WrongPhase(String),
    #[error("insufficient nodes for consensus: need {need}, have {have}")]
    InsufficientNodes { need: usize, have: usize },
    #[error("no active consensus round")]
    NoActiveRound,
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
    #[error("duplicate commit from node {node_id} (double-sign)")]
    DuplicateCommit {
        node_id: String,
        ban_request: Option<Box<BanRequest>>,
    },
    #[error("no eligible nodes for leader selection")]
    NoEligibleNodes,
    #[error("node not eligible: {0}")]
    NotEligible(String),
    #[error("round not ready to finalize: have {have} reveals, need {need}")]
    NotReadyToFinalize { have: usize, need: usize },
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
