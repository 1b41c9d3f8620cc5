//! In-memory account/chain state, shared across the node via `Arc`.

use crate::account::Account;
use crate::block::MicroBlock;
use crate::errors::{StateError, StateResult};
use crate::transaction::Transaction;
use dashmap::DashMap;
use sha3::{Digest, Sha3_256};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ChainState {
    pub height: u64,
    /// Total QNC minted so far. Starts at zero: QNet is a fair launch, no
    /// premine, supply grows only through Pool 1 base emission.
    pub total_supply: u64,
    pub epoch: u64,
    pub last_finalized: u64,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            height: 0,
            total_supply: 0,
            epoch: 0,
            last_finalized: 0,
        }
    }
}

/// Shared account/chain state for one shard (or the whole chain, if
/// sharding is disabled).
pub struct StateManager {
    pub accounts: Arc<DashMap<String, Account>>,
    pub chain_state: Arc<parking_lot::RwLock<ChainState>>,
    state_root: Arc<parking_lot::RwLock<[u8; 32]>>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(DashMap::new()),
            chain_state: Arc::new(parking_lot::RwLock::new(ChainState::default())),
            state_root: Arc::new(parking_lot::RwLock::new([0u8; 32])),
        }
    }

    pub fn get_account(&self, address: &str) -> Option<Account> {
        self.accounts.get(address).map(|acc| acc.clone())
    }

    pub fn update_account(&self, address: String, account: Account) {
        self.accounts.insert(address, account);
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.accounts.get(address).map(|acc| acc.balance).unwrap_or(0)
    }

    /// Apply a single transaction, copying only the accounts it touches out
    /// of the concurrent map, mutating them, and writing them back — avoids
    /// holding a `DashMap` shard lock across the whole apply.
    pub fn apply_transaction(&self, tx: &Transaction) -> StateResult<()> {
        let mut scratch: HashMap<String, Account> = HashMap::new();

        if let Some(acc) = self.accounts.get(&tx.from) {
            scratch.insert(tx.from.clone(), acc.clone());
        }
        if let Some(to) = &tx.to {
            if let Some(acc) = self.accounts.get(to) {
                scratch.insert(to.clone(), acc.clone());
            }
        }

        tx.apply_to_state(&mut scratch)?;

        for (address, account) in scratch {
            self.accounts.insert(address, account);
        }
        Ok(())
    }

    /// Apply every transaction in a microblock and advance chain height.
    pub fn apply_microblock(&self, block: &MicroBlock) -> StateResult<()> {
        for tx in &block.transactions {
            self.apply_transaction(tx)?;
        }
        let mut chain_state = self.chain_state.write();
        chain_state.height = block.height;
        Ok(())
    }

    pub fn get_chain_state(&self) -> ChainState {
        self.chain_state.read().clone()
    }

    /// Deterministic state root: Sha3-256 over every account, sorted by
    /// address, followed by the chain state's height and total supply.
    pub fn calculate_state_root(&self) -> StateResult<[u8; 32]> {
        let mut accounts: Vec<_> = self
            .accounts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = Sha3_256::new();
        for (address, account) in &accounts {
            hasher.update(address.as_bytes());
            hasher.update(&account.balance.to_le_bytes());
            hasher.update(&account.nonce.to_le_bytes());
            hasher.update(&(account.is_node as u8).to_le_bytes());
            if let Some(node_type) = account.node_type {
                hasher.update(node_type.as_str().as_bytes());
            }
        }

        let chain_state = self.chain_state.read();
        hasher.update(&chain_state.height.to_le_bytes());
        hasher.update(&chain_state.total_supply.to_le_bytes());

        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);

        *self.state_root.write() = hash;
        Ok(hash)
    }

    pub fn get_state_root(&self) -> [u8; 32] {
        *self.state_root.read()
    }

    /// Fair-launch genesis: no accounts, zero total supply. Supply only
    /// ever grows through Pool 1 base emission from here on.
    pub fn create_genesis(&self) -> StateResult<()> {
        {
            let mut chain_state = self.chain_state.write();
            *chain_state = ChainState::default();
        }
        self.calculate_state_root()?;
        tracing::info!(total_supply = 0, "genesis state created: fair launch, no premine");
        Ok(())
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("accounts", &self.accounts.len())
            .field("chain_state", &self.get_chain_state())
            .finish()
    }
}
