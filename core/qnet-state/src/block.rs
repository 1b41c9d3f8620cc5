//! Microblock / macroblock record types.
//!
//! QNet has no "standard" single-lane block: microblocks are produced every
//! second by the current leader, and a macroblock seals a window of them
//! with the commit-reveal consensus round's output plus enough of the
//! reward-pool and phase state to make the macroblock independently
//! verifiable without replaying every prior block.

use crate::account::Account;
use crate::errors::StateError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::HashMap;

pub type BlockHash = [u8; 32];

/// Height-indexed handle into the persisted microblock store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MicroblockRef {
    pub height: u64,
    pub hash: BlockHash,
}

/// Height-indexed handle into the persisted macroblock store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MacroblockRef {
    pub height: u64,
    pub hash: BlockHash,
}

/// A microblock: one second's worth of transactions, proposed by the
/// leader the commit-reveal round selected, not yet globally finalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MicroBlock {
    pub height: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub producer: String,
    pub signature: Vec<u8>,
    pub previous_hash: BlockHash,
    pub merkle_root: BlockHash,
}

/// Per-node-class payout counts and amounts for one reward window, embedded
/// in the macroblock that seals it so the distribution can be verified
/// without replaying the pool engine's internal state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WindowDistributionSummary {
    pub window_index: u64,
    pub pool1_distributed: u64,
    pub pool2_distributed: u64,
    pub pool3_distributed: u64,
    pub eligible_count: u64,
    pub per_class_counts: HashMap<String, u64>,
}

/// Phase-state snapshot embedded in a macroblock: enough to verify the
/// phase the node was in when the window closed, without replaying the
/// full activation ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseSnapshot {
    /// `1` or `2`.
    pub phase: u8,
    pub burn_percent: f64,
    pub network_age_years: f64,
    pub total_activations: u64,
}

/// Consensus round data carried by a macroblock: the commit-reveal
/// round's inputs and its output (the next leader).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusData {
    pub commits: HashMap<String, Vec<u8>>,
    pub reveals: HashMap<String, Vec<u8>>,
    pub next_leader: String,
}

/// A macroblock: seals a window of microblocks with the consensus round's
/// output and enough reward/phase context to be independently verifiable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroBlock {
    pub height: u64,
    pub timestamp: u64,
    pub micro_blocks: Vec<BlockHash>,
    pub state_root: BlockHash,
    pub consensus_data: ConsensusData,
    pub previous_hash: BlockHash,
    pub distribution: Option<WindowDistributionSummary>,
    pub phase_snapshot: PhaseSnapshot,
}

/// Mobile-facing header: everything a light node needs without the full
/// transaction list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightMicroBlock {
    pub height: u64,
    pub timestamp: u64,
    pub tx_count: u32,
    pub merkle_root: BlockHash,
    pub producer: String,
}

pub(crate) fn calculate_merkle_root(transactions: &[Transaction]) -> BlockHash {
    if transactions.is_empty() {
        return [0u8; 32];
    }

    let mut hashes: Vec<BlockHash> = transactions
        .iter()
        .map(|tx| {
            let hash_str = tx.calculate_hash();
            let hash_bytes = hex::decode(&hash_str).unwrap_or_else(|_| vec![0u8; 32]);
            let mut out = [0u8; 32];
            out.copy_from_slice(&hash_bytes[..32.min(hash_bytes.len())]);
            out
        })
        .collect();

    while hashes.len() > 1 {
        let mut next_level = Vec::with_capacity((hashes.len() + 1) / 2);
        for chunk in hashes.chunks(2) {
            let mut hasher = Sha3_256::new();
            hasher.update(&chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            let result = hasher.finalize();
            let mut out = [0u8; 32];
            out.copy_from_slice(&result);
            next_level.push(out);
        }
        hashes = next_level;
    }

    hashes[0]
}

impl MicroBlock {
    pub fn new(
        height: u64,
        timestamp: u64,
        previous_hash: BlockHash,
        transactions: Vec<Transaction>,
        producer: String,
    ) -> Self {
        let merkle_root = calculate_merkle_root(&transactions);
        Self {
            height,
            timestamp,
            transactions,
            producer,
            signature: vec![],
            previous_hash,
            merkle_root,
        }
    }

    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha3_256::new();
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&self.previous_hash);
        hasher.update(&self.merkle_root);
        hasher.update(self.producer.as_bytes());
        let result = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        out
    }

    pub fn to_light_header(&self) -> LightMicroBlock {
        LightMicroBlock {
            height: self.height,
            timestamp: self.timestamp,
            tx_count: self.transactions.len() as u32,
            merkle_root: self.merkle_root,
            producer: self.producer.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), StateError> {
        if self.timestamp == 0 {
            return Err(StateError::InvalidBlock("invalid timestamp".into()));
        }
        if self.transactions.len() > 10_000 {
            return Err(StateError::InvalidBlock("too many transactions in microblock".into()));
        }
        if calculate_merkle_root(&self.transactions) != self.merkle_root {
            return Err(StateError::InvalidBlock("invalid merkle root".into()));
        }
        for tx in &self.transactions {
            tx.validate()?;
        }
        Ok(())
    }

    pub fn apply_to_state(&self, accounts: &mut HashMap<String, Account>) -> Result<(), StateError> {
        for tx in &self.transactions {
            tx.apply_to_state(accounts)?;
        }
        Ok(())
    }
}

impl MacroBlock {
    pub fn new(
        height: u64,
        timestamp: u64,
        previous_hash: BlockHash,
        micro_blocks: Vec<BlockHash>,
        state_root: BlockHash,
        consensus_data: ConsensusData,
        distribution: Option<WindowDistributionSummary>,
        phase_snapshot: PhaseSnapshot,
    ) -> Self {
        Self {
            height,
            timestamp,
            micro_blocks,
            state_root,
            consensus_data,
            previous_hash,
            distribution,
            phase_snapshot,
        }
    }

    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha3_256::new();
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&self.previous_hash);
        hasher.update(&self.state_root);
        for micro_hash in &self.micro_blocks {
            hasher.update(micro_hash);
        }
        let result = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        out
    }

    /// A macroblock must seal at least one microblock and no more than the
    /// window's expected count (90 one-second microblocks per window, plus
    /// slack for a slow leader handoff).
    pub fn validate(&self) -> Result<(), StateError> {
        if self.timestamp == 0 {
            return Err(StateError::InvalidBlock("invalid timestamp".into()));
        }
        if self.micro_blocks.is_empty() || self.micro_blocks.len() > 100 {
            return Err(StateError::InvalidBlock("invalid microblock count".into()));
        }
        if self.consensus_data.reveals.len() < 3 {
            return Err(StateError::InvalidBlock("insufficient consensus participants".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionType;

    fn tx(from: &str, to: &str, amount: u64, nonce: u64) -> Transaction {
        Transaction::new(
            from.to_string(),
            Some(to.to_string()),
            amount,
            nonce,
            1,
            crate::transaction::gas_limits::TRANSFER,
            1_700_000_000,
            None,
            TransactionType::Transfer { from: from.to_string(), to: to.to_string(), amount },
        )
    }

    #[test]
    fn merkle_root_changes_with_transactions() {
        let empty = calculate_merkle_root(&[]);
        let one = calculate_merkle_root(&[tx("a", "b", 10, 0)]);
        assert_ne!(empty, one);
    }

    #[test]
    fn microblock_detects_tampered_merkle_root() {
        let mut block = MicroBlock::new(1, 1_700_000_000, [0u8; 32], vec![tx("a", "b", 10, 0)], "leader".into());
        block.merkle_root = [9u8; 32];
        assert!(block.validate().is_err());
    }

    #[test]
    fn macroblock_rejects_too_few_reveals() {
        let block = MacroBlock::new(
            1,
            1_700_000_000,
            [0u8; 32],
            vec![[1u8; 32]],
            [0u8; 32],
            ConsensusData {
                commits: HashMap::new(),
                reveals: HashMap::new(),
                next_leader: "node-1".into(),
            },
            None,
            PhaseSnapshot { phase: 1, burn_percent: 10.0, network_age_years: 0.5, total_activations: 100 },
        );
        assert!(block.validate().is_err());
    }
}
