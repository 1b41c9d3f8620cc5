//! Transaction priority, used to pick the next batch for a microblock.

use qnet_state::transaction::Transaction;
use std::cmp::Ordering;
use std::time::Instant;

/// Priority of one mempool entry. Higher `score` is drained first.
#[derive(Debug, Clone)]
pub struct TxPriority {
    pub gas_price: u64,
    pub added_at: Instant,
    pub score: f64,
}

impl TxPriority {
    pub fn new(tx: &Transaction) -> Self {
        let mut priority = Self {
            gas_price: tx.gas_price,
            added_at: Instant::now(),
            score: 0.0,
        };
        priority.score = priority.calculate_score();
        priority
    }

    fn calculate_score(&self) -> f64 {
        let age = self.added_at.elapsed().as_secs() as f64;
        // Gas price dominates; age adds a bounded boost so an old,
        // low-fee transaction isn't starved forever.
        self.gas_price as f64 + age.min(300.0) * 0.1
    }

    pub fn update_score(&mut self) {
        self.score = self.calculate_score();
    }
}

impl PartialEq for TxPriority {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl Eq for TxPriority {}

impl PartialOrd for TxPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.score.partial_cmp(&other.score)
    }
}

impl Ord for TxPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_state::transaction::TransactionType;

    fn tx(gas_price: u64) -> Transaction {
        Transaction::new(
            "sender".into(),
            Some("recipient".into()),
            100,
            1,
            gas_price,
            qnet_state::transaction::gas_limits::TRANSFER,
            1_700_000_000,
            None,
            TransactionType::Transfer { from: "sender".into(), to: "recipient".into(), amount: 100 },
        )
    }

    #[test]
    fn higher_gas_price_outranks_lower() {
        let high = TxPriority::new(&tx(100));
        let low = TxPriority::new(&tx(50));
        assert!(high > low);
    }
}
