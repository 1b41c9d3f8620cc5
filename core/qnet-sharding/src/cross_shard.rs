//! Cross-shard two-phase commit (component E, spec.md §4.E.3):
//! `Pending → Locked → Committed` or `Pending/Locked → Failed/Reverted`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::coordinator::ShardCoordinator;
use crate::errors::{ShardError, ShardResult};

pub const MAX_CROSS_SHARD_TXS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossShardStatus {
    Pending,
    Locked,
    Committed,
    Failed,
    Reverted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossShardTx {
    pub tx_id: String,
    pub from_shard: u32,
    pub to_shard: u32,
    pub from_address: String,
    pub to_address: String,
    pub amount: u64,
    pub nonce: u64,
    pub created_at: u64,
    pub status: CrossShardStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossShardStats {
    pub total: u64,
    pub pending: u64,
    pub locked: u64,
    pub committed: u64,
    pub failed: u64,
    pub reverted: u64,
}

/// Revert window: a `Locked` tx not reaching `Committed` within this many
/// seconds is reverted, crediting the source address back.
pub const COMMIT_WINDOW_SECONDS: u64 = 300;

/// Manages the cross-shard transaction queue on top of a [`ShardCoordinator`].
/// Bounded at [`MAX_CROSS_SHARD_TXS`]; retries are idempotent keyed by `tx_id`.
pub struct CrossShardManager {
    coordinator: Arc<ShardCoordinator>,
    queue: RwLock<HashMap<String, CrossShardTx>>,
}

impl CrossShardManager {
    pub fn new(coordinator: Arc<ShardCoordinator>) -> Self {
        Self {
            coordinator,
            queue: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new cross-shard transaction in `Pending`, then attempt the
    /// prepare (lock) step if the source shard is locally managed.
    pub fn submit(
        &self,
        tx_id: String,
        from_address: String,
        to_address: String,
        amount: u64,
        nonce: u64,
        now: u64,
    ) -> ShardResult<CrossShardStatus> {
        {
            let queue = self.queue.read();
            if let Some(existing) = queue.get(&tx_id) {
                return Ok(existing.status);
            }
            if queue.len() >= MAX_CROSS_SHARD_TXS {
                return Err(ShardError::QueueFull(MAX_CROSS_SHARD_TXS));
            }
        }

        let from_shard = self.coordinator.shard_of(&from_address);
        let to_shard = self.coordinator.shard_of(&to_address);
        if from_shard == to_shard {
            return Err(ShardError::NotCrossShardTransaction);
        }

        let mut tx = CrossShardTx {
            tx_id: tx_id.clone(),
            from_shard,
            to_shard,
            from_address: from_address.clone(),
            to_address: to_address.clone(),
            amount,
            nonce,
            created_at: now,
            status: CrossShardStatus::Pending,
        };

        if self.coordinator.manages(from_shard) {
            match self.coordinator.debit_locked(from_shard, &from_address, amount, nonce, now) {
                Ok(()) => {
                    tx.status = CrossShardStatus::Locked;
                    tracing::info!(tx_id = %tx_id, from_shard, to_shard, "cross-shard tx locked");
                }
                Err(ShardError::InsufficientBalance { .. }) => {
                    tx.status = CrossShardStatus::Failed;
                    tracing::warn!(tx_id = %tx_id, "cross-shard tx failed: insufficient balance");
                }
                Err(ShardError::InvalidNonce { expected, got }) => {
                    tx.status = CrossShardStatus::Failed;
                    tracing::warn!(tx_id = %tx_id, expected, got, "cross-shard tx failed: out-of-order nonce");
                }
                Err(e) => return Err(e),
            }
        }

        let status = tx.status;
        self.queue.write().insert(tx_id, tx);
        Ok(status)
    }

    /// Commit step, run on the destination shard once it observes the
    /// `Locked` status. Idempotent: re-committing an already-`Committed`
    /// tx is a no-op.
    pub fn complete(&self, tx_id: &str, now: u64) -> ShardResult<CrossShardStatus> {
        let (to_shard, to_address, amount, already_done) = {
            let queue = self.queue.read();
            let tx = queue
                .get(tx_id)
                .ok_or_else(|| ShardError::TransactionNotFound(tx_id.to_string()))?;
            if tx.status == CrossShardStatus::Committed {
                return Ok(CrossShardStatus::Committed);
            }
            if tx.status != CrossShardStatus::Locked {
                return Err(ShardError::NotCrossShardTransaction);
            }
            (tx.to_shard, tx.to_address.clone(), tx.amount, false)
        };
        let _ = already_done;

        if !self.coordinator.manages(to_shard) {
            return Err(ShardError::ShardNotManaged(to_shard));
        }
        self.coordinator.credit_committed(to_shard, &to_address, amount, now)?;

        let mut queue = self.queue.write();
        if let Some(tx) = queue.get_mut(tx_id) {
            tx.status = CrossShardStatus::Committed;
        }
        tracing::info!(tx_id, "cross-shard tx committed");
        Ok(CrossShardStatus::Committed)
    }

    /// Sweep `Locked` transactions whose commit window has elapsed without
    /// reaching `Committed`, crediting the source address back.
    pub fn sweep_expired(&self, now: u64) {
        let expired: Vec<String> = {
            let queue = self.queue.read();
            queue
                .values()
                .filter(|tx| {
                    tx.status == CrossShardStatus::Locked
                        && now.saturating_sub(tx.created_at) > COMMIT_WINDOW_SECONDS
                })
                .map(|tx| tx.tx_id.clone())
                .collect()
        };

        for tx_id in expired {
            let (from_shard, from_address, amount) = {
                let queue = self.queue.read();
                let tx = &queue[&tx_id];
                (tx.from_shard, tx.from_address.clone(), tx.amount)
            };
            if self.coordinator.manages(from_shard)
                && self
                    .coordinator
                    .credit_reverted(from_shard, &from_address, amount, now)
                    .is_ok()
            {
                let mut queue = self.queue.write();
                if let Some(tx) = queue.get_mut(&tx_id) {
                    tx.status = CrossShardStatus::Reverted;
                }
                tracing::info!(tx_id, "cross-shard tx reverted after commit window expired");
            }
        }
    }

    pub fn status(&self, tx_id: &str) -> Option<CrossShardStatus> {
        self.queue.read().get(tx_id).map(|tx| tx.status)
    }

    /// Lock-free snapshot of queue counts by status.
    pub fn stats(&self) -> CrossShardStats {
        let queue = self.queue.read();
        let mut stats = CrossShardStats {
            total: queue.len() as u64,
            ..Default::default()
        };
        for tx in queue.values() {
            match tx.status {
                CrossShardStatus::Pending => stats.pending += 1,
                CrossShardStatus::Locked => stats.locked += 1,
                CrossShardStatus::Committed => stats.committed += 1,
                CrossShardStatus::Failed => stats.failed += 1,
                CrossShardStatus::Reverted => stats.reverted += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<ShardCoordinator>, CrossShardManager, String, String) {
        let coord = Arc::new(ShardCoordinator::new(64, (0..64).collect()));
        let mut alice = "alice".to_string();
        let mut bob = "bob".to_string();
        while coord.shard_of(&alice) == coord.shard_of(&bob) {
            bob.push('x');
        }
        coord.seed_balance(&alice, 100, 0).unwrap();
        let manager = CrossShardManager::new(coord.clone());
        (coord, manager, alice, bob)
    }

    #[test]
    fn happy_path_commits_and_conserves_funds() {
        let (coord, manager, alice, bob) = setup();
        let status = manager.submit("tx-1".into(), alice.clone(), bob.clone(), 40, 1, 0).unwrap();
        assert_eq!(status, CrossShardStatus::Locked);
        assert_eq!(coord.get_account(&alice).unwrap().balance, 60);

        let status = manager.complete("tx-1", 10).unwrap();
        assert_eq!(status, CrossShardStatus::Committed);
        assert_eq!(coord.get_account(&bob).unwrap().balance, 40);
    }

    #[test]
    fn insufficient_balance_fails_without_moving_funds() {
        let (coord, manager, alice, bob) = setup();
        let status = manager.submit("tx-2".into(), alice.clone(), bob.clone(), 1000, 1, 0).unwrap();
        assert_eq!(status, CrossShardStatus::Failed);
        assert_eq!(coord.get_account(&alice).unwrap().balance, 100);
    }

    #[test]
    fn retry_is_idempotent_by_tx_id() {
        let (_, manager, alice, bob) = setup();
        let first = manager.submit("tx-3".into(), alice.clone(), bob.clone(), 10, 1, 0).unwrap();
        let second = manager.submit("tx-3".into(), alice, bob, 10, 1, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn expired_lock_reverts_funds() {
        let (coord, manager, alice, bob) = setup();
        manager.submit("tx-4".into(), alice.clone(), bob, 30, 1, 0).unwrap();
        assert_eq!(coord.get_account(&alice).unwrap().balance, 70);

        manager.sweep_expired(COMMIT_WINDOW_SECONDS + 1);
        assert_eq!(manager.status("tx-4"), Some(CrossShardStatus::Reverted));
        assert_eq!(coord.get_account(&alice).unwrap().balance, 100);
    }

    #[test]
    fn out_of_order_nonce_fails_without_moving_funds() {
        let (coord, manager, alice, bob) = setup();
        let status = manager.submit("tx-5".into(), alice.clone(), bob, 10, 2, 0).unwrap();
        assert_eq!(status, CrossShardStatus::Failed);
        assert_eq!(coord.get_account(&alice).unwrap().balance, 100);
    }

    #[test]
    fn second_cross_shard_debit_requires_advanced_nonce() {
        let (coord, manager, alice, bob) = setup();
        let first = manager.submit("tx-6".into(), alice.clone(), bob.clone(), 10, 1, 0).unwrap();
        assert_eq!(first, CrossShardStatus::Locked);
        // Replaying nonce 1 for a second tx is out of order once the first
        // debit has advanced the account's nonce.
        let second = manager.submit("tx-7".into(), alice.clone(), bob, 10, 1, 0).unwrap();
        assert_eq!(second, CrossShardStatus::Failed);
        assert_eq!(coord.get_account(&alice).unwrap().balance, 90);
    }
}
