//! Node-level error type: aggregates every core crate's error enum via
//! `#[from]`, mirroring the teacher's `IntegrationError`/`QNetError`
//! layering but collapsed to one enum now that storage/network/RPC are
//! no longer part of this crate's surface.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    State(#[from] qnet_state::StateError),
    #[error(transparent)]
    Consensus(#[from] qnet_consensus::ConsensusError),
    #[error(transparent)]
    Shard(#[from] qnet_sharding::ShardError),
    #[error(transparent)]
    Mempool(#[from] qnet_mempool::MempoolError),
    #[error(transparent)]
    Activation(#[from] qnet_consensus::ActivationError),
    #[error(transparent)]
    Pool(#[from] qnet_consensus::PoolError),
    #[error("security envelope rejected request: {0}")]
    EnvelopeRejected(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("already running")]
    AlreadyRunning,
    #[error("not running")]
    NotRunning,
}

pub type NodeResult<T> = Result<T, NodeError>;
