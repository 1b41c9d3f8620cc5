//! Concurrent transaction mempool feeding the block pipeline.

use crate::config::MempoolConfig;
use crate::errors::{MempoolError, MempoolResult};
use crate::eviction::{DefaultEvictionPolicy, EvictionPolicy};
use crate::priority::TxPriority;
use crate::validation::{DefaultValidator, SimpleValidator, TxValidator};
use dashmap::DashMap;
use parking_lot::RwLock;
use priority_queue::PriorityQueue;
use qnet_state::state::StateManager;
use qnet_state::transaction::{Transaction, TxHash};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Clone)]
struct TxEntry {
    tx: Transaction,
    added_at: Instant,
}

/// Holds validated, not-yet-sealed transactions ordered by priority. The
/// block pipeline (F) drains the top of this queue to fill each microblock;
/// admission runs validation once and evicts by age or priority under
/// capacity pressure (spec.md §5 backpressure).
pub struct Mempool {
    config: MempoolConfig,
    transactions: Arc<DashMap<TxHash, TxEntry>>,
    by_sender: Arc<DashMap<String, BTreeMap<u64, TxHash>>>,
    priority_queue: RwLock<PriorityQueue<TxHash, TxPriority>>,
    validator: Arc<dyn TxValidator>,
    eviction: DefaultEvictionPolicy,
    last_eviction: RwLock<Instant>,
}

impl Mempool {
    pub fn new(config: MempoolConfig, state: Arc<StateManager>) -> Self {
        let validator = Arc::new(DefaultValidator::new(state, config.min_gas_price));
        Self::with_validator(config, validator)
    }

    /// Without live account state to validate against (structural checks only).
    pub fn new_simple(config: MempoolConfig) -> Self {
        let validator = Arc::new(SimpleValidator::new(config.min_gas_price));
        Self::with_validator(config, validator)
    }

    fn with_validator(config: MempoolConfig, validator: Arc<dyn TxValidator>) -> Self {
        let eviction = DefaultEvictionPolicy {
            max_age: Duration::from_secs(config.tx_ttl_seconds),
            min_gas_price: config.min_gas_price,
        };
        Self {
            config,
            transactions: Arc::new(DashMap::new()),
            by_sender: Arc::new(DashMap::new()),
            priority_queue: RwLock::new(PriorityQueue::new()),
            validator,
            eviction,
            last_eviction: RwLock::new(Instant::now()),
        }
    }

    pub fn add_transaction(&self, tx: Transaction) -> MempoolResult<()> {
        if self.transactions.contains_key(&tx.hash) {
            return Err(MempoolError::DuplicateTransaction(tx.hash.clone()));
        }

        let validation = self.validator.validate(&tx)?;
        if !validation.is_valid {
            return Err(MempoolError::ValidationFailed(validation.errors.join("; ")));
        }

        if self.transactions.len() >= self.config.max_size {
            self.evict(1);
            if self.transactions.len() >= self.config.max_size {
                return Err(MempoolError::MempoolFull { capacity: self.config.max_size });
            }
        }

        if let Some(sender_txs) = self.by_sender.get(&tx.from) {
            if sender_txs.len() >= self.config.max_per_sender {
                return Err(MempoolError::SenderLimitExceeded { limit: self.config.max_per_sender });
            }
            if let Some(expected) = validation.expected_nonce {
                if tx.nonce > expected && !sender_txs.contains_key(&expected) {
                    return Err(MempoolError::NonceGap { expected, got: tx.nonce });
                }
            }
        }

        self.insert(tx.clone());
        info!(hash = %short_hash(&tx.hash), "transaction admitted to mempool");

        if self.last_eviction.read().elapsed() > Duration::from_secs(self.config.eviction_interval_seconds) {
            self.sweep_expired();
        }
        Ok(())
    }

    fn insert(&self, tx: Transaction) {
        let priority = TxPriority::new(&tx);
        self.by_sender
            .entry(tx.from.clone())
            .or_default()
            .insert(tx.nonce, tx.hash.clone());
        self.priority_queue.write().push(tx.hash.clone(), priority);
        self.transactions.insert(tx.hash.clone(), TxEntry { tx, added_at: Instant::now() });
    }

    pub fn get_transaction(&self, hash: &TxHash) -> Option<Transaction> {
        self.transactions.get(hash).map(|e| e.tx.clone())
    }

    pub fn get_sender_transactions(&self, sender: &str) -> Vec<Transaction> {
        self.by_sender
            .get(sender)
            .map(|txs| txs.values().filter_map(|h| self.get_transaction(h)).collect())
            .unwrap_or_default()
    }

    pub fn get_next_nonce(&self, sender: &str) -> u64 {
        self.by_sender
            .get(sender)
            .and_then(|txs| txs.keys().max().map(|n| n + 1))
            .unwrap_or(0)
    }

    pub fn remove_transaction(&self, hash: &TxHash) -> Option<Transaction> {
        let (_, entry) = self.transactions.remove(hash)?;
        if let Some(mut sender_txs) = self.by_sender.get_mut(&entry.tx.from) {
            sender_txs.remove(&entry.tx.nonce);
            let empty = sender_txs.is_empty();
            drop(sender_txs);
            if empty {
                self.by_sender.remove(&entry.tx.from);
            }
        }
        self.priority_queue.write().remove(hash);
        debug!(hash = %short_hash(hash), "transaction removed from mempool");
        Some(entry.tx)
    }

    /// Top `target_size` transactions by priority, for the leader's
    /// microblock proposal. Does not remove them — call
    /// [`Self::confirm_transactions`] once the microblock is sealed.
    pub fn get_microblock_transactions(&self, target_size: usize) -> Vec<Transaction> {
        let queue = self.priority_queue.read();
        let mut by_score: Vec<(&TxHash, f64)> = queue.iter().map(|(h, p)| (h, p.score)).collect();
        by_score.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        by_score
            .into_iter()
            .take(target_size)
            .filter_map(|(hash, _)| self.get_transaction(hash))
            .collect()
    }

    pub fn confirm_transactions(&self, tx_hashes: &[TxHash]) {
        for hash in tx_hashes {
            self.remove_transaction(hash);
        }
    }

    fn evict(&self, count: usize) {
        let now = Instant::now();
        let mut to_remove: Vec<TxHash> = self
            .transactions
            .iter()
            .filter(|entry| self.eviction.should_evict(&entry.tx, now.duration_since(entry.added_at)))
            .map(|entry| entry.key().clone())
            .take(count)
            .collect();

        if to_remove.len() < count {
            let queue = self.priority_queue.read();
            let mut by_score: Vec<(TxHash, f64)> = queue.iter().map(|(h, p)| (h.clone(), p.score)).collect();
            by_score.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            for (hash, _) in by_score.into_iter().take(count - to_remove.len()) {
                if !to_remove.contains(&hash) {
                    to_remove.push(hash);
                }
            }
        }

        for hash in to_remove {
            self.remove_transaction(&hash);
        }
    }

    /// Periodic sweep: drop expired entries and refresh age-boosted scores.
    pub fn sweep_expired(&self) {
        *self.last_eviction.write() = Instant::now();
        let now = Instant::now();

        let expired: Vec<TxHash> = self
            .transactions
            .iter()
            .filter(|entry| now.duration_since(entry.added_at) > Duration::from_secs(self.config.tx_ttl_seconds))
            .map(|entry| entry.key().clone())
            .collect();
        for hash in expired {
            self.remove_transaction(&hash);
        }

        let mut queue = self.priority_queue.write();
        let mut refreshed = Vec::with_capacity(queue.len());
        while let Some((hash, mut priority)) = queue.pop() {
            priority.update_score();
            refreshed.push((hash, priority));
        }
        for (hash, priority) in refreshed {
            queue.push(hash, priority);
        }
    }

    pub fn size(&self) -> usize {
        self.transactions.len()
    }

    pub fn stats(&self) -> MempoolStats {
        let queue = self.priority_queue.read();
        let avg_gas_price = if queue.is_empty() {
            0
        } else {
            queue.iter().map(|(_, p)| p.gas_price).sum::<u64>() / queue.len() as u64
        };
        MempoolStats {
            total_transactions: self.transactions.len(),
            unique_senders: self.by_sender.len(),
            avg_gas_price,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MempoolStats {
    pub total_transactions: usize,
    pub unique_senders: usize,
    pub avg_gas_price: u64,
}

fn short_hash(hash: &str) -> &str {
    if hash.len() >= 8 { &hash[..8] } else { hash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_state::account::Account;
    use qnet_state::transaction::TransactionType;

    fn tx(from: &str, nonce: u64, gas_price: u64) -> Transaction {
        Transaction::new(
            from.into(),
            Some("recipient".into()),
            100,
            nonce,
            gas_price,
            qnet_state::transaction::gas_limits::TRANSFER,
            1_700_000_000,
            None,
            TransactionType::Transfer { from: from.into(), to: "recipient".into(), amount: 100 },
        )
    }

    fn mempool_with_alice(balance: u64) -> Mempool {
        let state = Arc::new(StateManager::new());
        state.update_account("alice".into(), Account::with_balance("alice".into(), balance));
        Mempool::new(MempoolConfig::default(), state)
    }

    #[test]
    fn duplicate_transaction_is_rejected() {
        let pool = mempool_with_alice(1_000_000);
        let t = tx("alice", 0, 10);
        pool.add_transaction(t.clone()).unwrap();
        let err = pool.add_transaction(t).unwrap_err();
        assert!(matches!(err, MempoolError::DuplicateTransaction(_)));
    }

    #[test]
    fn microblock_selection_orders_by_priority() {
        let pool = mempool_with_alice(10_000_000);
        pool.add_transaction(tx("alice", 0, 5)).unwrap();
        pool.add_transaction(tx("alice", 1, 50)).unwrap();

        let selected = pool.get_microblock_transactions(1);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].gas_price, 50);
    }

    #[test]
    fn confirm_transactions_removes_them() {
        let pool = mempool_with_alice(1_000_000);
        let t = tx("alice", 0, 10);
        pool.add_transaction(t.clone()).unwrap();
        pool.confirm_transactions(&[t.hash.clone()]);
        assert_eq!(pool.size(), 0);
        assert!(pool.get_transaction(&t.hash).is_none());
    }

    #[test]
    fn sender_limit_rejects_further_submissions() {
        let mut config = MempoolConfig::default();
        config.max_per_sender = 1;
        let state = Arc::new(StateManager::new());
        state.update_account("alice".into(), Account::with_balance("alice".into(), 10_000_000));
        let pool = Mempool::new(config, state);
        pool.add_transaction(tx("alice", 0, 10)).unwrap();
        let err = pool.add_transaction(tx("alice", 1, 10)).unwrap_err();
        assert!(matches!(err, MempoolError::SenderLimitExceeded { .. }));
    }
}
