//! Eviction policy: which transaction to drop when the mempool is full.

use qnet_state::transaction::Transaction;
use std::time::Duration;

pub trait EvictionPolicy: Send + Sync {
    fn should_evict(&self, tx: &Transaction, age: Duration) -> bool;
    fn compare_for_eviction(&self, tx1: &Transaction, tx2: &Transaction) -> std::cmp::Ordering;
}

/// Evicts by age first, then by lowest gas price.
pub struct DefaultEvictionPolicy {
    pub max_age: Duration,
    pub min_gas_price: u64,
}

impl Default for DefaultEvictionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(1_800),
            min_gas_price: 1,
        }
    }
}

impl EvictionPolicy for DefaultEvictionPolicy {
    fn should_evict(&self, tx: &Transaction, age: Duration) -> bool {
        age > self.max_age || tx.gas_price < self.min_gas_price
    }

    fn compare_for_eviction(&self, tx1: &Transaction, tx2: &Transaction) -> std::cmp::Ordering {
        match tx1.gas_price.cmp(&tx2.gas_price) {
            std::cmp::Ordering::Equal => tx1.timestamp.cmp(&tx2.timestamp),
            other => other,
        }
    }
}
