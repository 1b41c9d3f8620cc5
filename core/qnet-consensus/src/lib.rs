//! Consensus mechanisms for the QNet node: reputation (A), the phase and
//! activation ledger (B), the reward pool engine (C), and commit-reveal
//! leader election (D).

pub mod commit_reveal;
pub mod dynamic_timing;
pub mod errors;
pub mod leader_selection;
pub mod phase;
pub mod pools;
pub mod reputation;

pub use commit_reveal::{CommitRevealConsensus, RoundPhase, RoundResult};
pub use dynamic_timing::{DynamicTiming, RoundTiming};
pub use errors::{ConsensusError, ConsensusResult};
pub use phase::{ActivationEntry, ActivationError, Phase, PhaseLedger, PhaseState, PhaseTransition, PricingConfig};
pub use pools::{NodeRecord, NodeStatus, PoolEngine, PoolError, PoolState, WindowDistribution};
pub use reputation::{BanRequest, ReputationConfig, ReputationError, ReputationEventKind, ReputationRegistry};
