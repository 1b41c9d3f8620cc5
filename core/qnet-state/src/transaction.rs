//! Transaction types and their effect on account state.

use crate::account::{ActivationPhase, Account, NodeType};
use crate::errors::{StateError, StateResult};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TxHash = String;

/// Gas price, expressed in the smallest QNC unit per gas unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GasPrice(pub u64);

/// Fixed gas limits per transaction type, mirroring the cost model the
/// block pipeline uses to bound a microblock's execution budget.
pub mod gas_limits {
    pub const TRANSFER: u64 = 10_000;
    pub const NODE_ACTIVATION: u64 = 50_000;
    pub const REWARD_DISTRIBUTION: u64 = 25_000;
    pub const PING: u64 = 0;
    pub const MAX_GAS_LIMIT: u64 = 1_000_000;
}

/// Operation a transaction performs against account state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TransactionType {
    /// Move `amount` from `from` to `to`.
    Transfer { from: String, to: String, amount: u64 },
    /// Activate `from` as a node of `node_type`, paying `burn_amount` under
    /// `phase` (Phase 1 burns an external token off-chain; Phase 2 transfers
    /// QNC into Pool 3 — both are represented here as a balance debit, the
    /// destination of the funds is a consensus-layer concern, not state's).
    NodeActivation {
        node_type: NodeType,
        burn_amount: u64,
        phase: ActivationPhase,
    },
    /// System transaction crediting a window's reward distribution to a
    /// single account. Only valid when signed by a system/reward account.
    RewardDistribution,
    /// Account creation with an initial balance, used for the cross-shard
    /// commit path when a receiving shard sees a brand-new address.
    CreateAccount { address: String, initial_balance: u64 },
}

/// Execution status assigned to a transaction once processed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failed(String),
}

/// A transaction as it appears inside a microblock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub hash: TxHash,
    pub from: String,
    pub to: Option<String>,
    pub amount: u64,
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub timestamp: u64,
    pub signature: Option<String>,
    pub tx_type: TransactionType,
}

pub type TransactionReceipt = Transaction;

impl Transaction {
    pub fn new(
        from: String,
        to: Option<String>,
        amount: u64,
        nonce: u64,
        gas_price: u64,
        gas_limit: u64,
        timestamp: u64,
        signature: Option<String>,
        tx_type: TransactionType,
    ) -> Self {
        let mut tx = Self {
            hash: String::new(),
            from,
            to,
            amount,
            nonce,
            gas_price,
            gas_limit,
            timestamp,
            signature,
            tx_type,
        };
        tx.hash = tx.calculate_hash();
        tx
    }

    /// Content hash over every field except `hash` and `signature`.
    pub fn calculate_hash(&self) -> TxHash {
        let mut hasher = Hasher::new();
        hasher.update(self.from.as_bytes());
        hasher.update(self.to.as_deref().unwrap_or_default().as_bytes());
        hasher.update(&self.amount.to_le_bytes());
        hasher.update(&self.nonce.to_le_bytes());
        hasher.update(&self.gas_price.to_le_bytes());
        hasher.update(&self.gas_limit.to_le_bytes());
        hasher.update(&self.timestamp.to_le_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    pub fn value(&self) -> u64 {
        self.amount
    }

    pub fn validate(&self) -> StateResult<()> {
        if self.from.is_empty() {
            return Err(StateError::InvalidTransaction("empty sender address".into()));
        }
        if self.hash != self.calculate_hash() {
            return Err(StateError::InvalidTransaction("hash mismatch".into()));
        }
        match &self.tx_type {
            TransactionType::Transfer { from, to, amount } => {
                if from == to {
                    return Err(StateError::InvalidTransaction("cannot transfer to self".into()));
                }
                if *amount == 0 {
                    return Err(StateError::InvalidTransaction("transfer amount must be nonzero".into()));
                }
            }
            TransactionType::NodeActivation { burn_amount, .. } => {
                if *burn_amount == 0 {
                    return Err(StateError::InvalidTransaction("burn amount must be nonzero".into()));
                }
            }
            TransactionType::RewardDistribution => {
                if !self.from.starts_with("system_") {
                    return Err(StateError::InvalidTransaction(
                        "only a system account may distribute rewards".into(),
                    ));
                }
            }
            TransactionType::CreateAccount { address, initial_balance } => {
                if address.is_empty() {
                    return Err(StateError::InvalidTransaction("address cannot be empty".into()));
                }
                if *initial_balance == 0 {
                    return Err(StateError::InvalidTransaction("initial balance must be nonzero".into()));
                }
            }
        }
        Ok(())
    }

    /// Apply this transaction's effect to `accounts`. Gas (`gas_price *
    /// gas_limit`) is charged to the sender on top of any transferred
    /// amount, matching the node's block-pipeline cost accounting.
    pub fn apply_to_state(&self, accounts: &mut HashMap<String, Account>) -> StateResult<()> {
        match &self.tx_type {
            TransactionType::Transfer { from, to, amount } => {
                let fee = self.gas_price * self.gas_limit;
                let sender = accounts
                    .get_mut(from)
                    .ok_or_else(|| StateError::AccountNotFound(from.clone()))?;
                let total = amount + fee;
                if sender.balance < total {
                    return Err(StateError::InsufficientBalance {
                        have: sender.balance,
                        need: total,
                    });
                }
                sender.balance -= total;
                sender.nonce += 1;

                let receiver = accounts
                    .entry(to.clone())
                    .or_insert_with(|| Account::new(to.clone()));
                receiver.balance += amount;
            }
            TransactionType::NodeActivation { node_type, burn_amount, phase } => {
                let fee = self.gas_price * self.gas_limit;
                let sender = accounts
                    .get_mut(&self.from)
                    .ok_or_else(|| StateError::AccountNotFound(self.from.clone()))?;
                let total = burn_amount + fee;
                if sender.balance < total {
                    return Err(StateError::InsufficientBalance {
                        have: sender.balance,
                        need: total,
                    });
                }
                sender.balance -= total;
                sender.nonce += 1;
                sender.activate_node(*node_type, *phase, self.timestamp);
            }
            TransactionType::RewardDistribution => {
                if let Some(to) = &self.to {
                    let recipient = accounts
                        .entry(to.clone())
                        .or_insert_with(|| Account::new(to.clone()));
                    recipient.balance += self.amount;
                }
            }
            TransactionType::CreateAccount { address, initial_balance } => {
                if accounts.contains_key(address) {
                    return Err(StateError::InvalidTransaction("account already exists".into()));
                }
                let mut account = Account::new(address.clone());
                account.balance = *initial_balance;
                accounts.insert(address.clone(), account);
            }
        }
        Ok(())
    }
}
