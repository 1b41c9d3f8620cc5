//! Account, transaction, and block state shared by the consensus, sharding,
//! and node-composition crates.

pub mod account;
pub mod block;
pub mod errors;
pub mod state;
pub mod transaction;

pub use account::{Account, AccountState, ActivationPhase, NodeType};
pub use block::{
    ConsensusData, LightMicroBlock, MacroBlock, MacroblockRef, MicroBlock, MicroblockRef,
    PhaseSnapshot, WindowDistributionSummary,
};
pub use errors::{StateError, StateResult};
pub use state::{ChainState, StateManager};
pub use transaction::{gas_limits, Transaction, TransactionReceipt, TransactionType, TxStatus};

pub type Address = String;
pub type Amount = u64;
pub type Nonce = u64;

pub mod prelude {
    pub use crate::{
        Account, AccountState, ChainState, MacroBlock, MicroBlock, StateError, StateManager,
        StateResult, Transaction, TransactionReceipt,
    };
}
