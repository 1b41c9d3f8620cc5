//! Reward Pool Engine (component C): ping-slot scheduling, eligibility,
//! three-pool distribution, and the node lifecycle (quarantine / prune /
//! restore / ban).

use dashmap::DashMap;
use qnet_core::hash::blake2b_u64;
use qnet_state::NodeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::reputation::ReputationRegistry;

pub const REWARD_WINDOW_SECONDS: u64 = 14_400;
pub const PING_SLOTS_DEFAULT: u64 = 240;
pub const PING_SLOTS_SUPER: u64 = 24;
pub const PING_SLOT_DURATION_SECONDS: u64 = 60;
pub const PING_GRACE_SECONDS: u64 = 30;

pub const MIN_REPUTATION_LIGHT: f64 = 0.0;
pub const MIN_REPUTATION_FULL_SUPER: f64 = 70.0;

pub const INACTIVE_THRESHOLD_SECONDS: u64 = 7 * 24 * 60 * 60;
pub const QUARANTINE_DURATION_SECONDS: u64 = 7 * 24 * 60 * 60;
pub const MAX_FREE_RESTORATIONS: u32 = 10;
pub const RESTORE_WINDOW_SECONDS: u64 = 30 * 24 * 60 * 60;
pub const REACTIVATION_REQUIRED_AFTER_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Pool 1 initial per-window emission (spec.md §4.C.1), halved every 4
/// years from genesis.
pub const POOL1_BASE_EMISSION: f64 = 251_432.34;
pub const POOL1_HALVING_PERIOD_SECONDS: u64 = 4 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Active,
    Quarantined { until: u64 },
    Pruned,
    Banned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub node_type: NodeType,
    pub owner_address: String,
    pub activation_epoch: u64,
    pub last_ping_unix: u64,
    pub status: NodeStatus,
    pub restoration_count_window: u32,
    pub restoration_window_started: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
    pub pool1_base: u64,
    pub pool2_fees: u64,
    pub pool3_activation: u64,
    pub window_index: u64,
    pub last_distribution_unix: u64,
}

impl Default for PoolState {
    fn default() -> Self {
        Self {
            pool1_base: 0,
            pool2_fees: 0,
            pool3_activation: 0,
            window_index: 0,
            last_distribution_unix: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowDistribution {
    pub window_index: u64,
    pub credits: HashMap<String, u64>,
    pub pool1_distributed: u64,
    pub pool2_distributed: u64,
    pub pool3_distributed: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("node is not active")]
    NotActive,
    #[error("quarantine duration must be greater than zero")]
    InvalidQuarantineDuration,
}

/// Deterministic ping-slot assignment: `slot = blake2b_u64(node_id) mod S`,
/// `S=24` for Super nodes (privileged leading slots), `S=240` otherwise.
pub fn ping_slot(node_id: &str, node_type: NodeType) -> u64 {
    let slots = match node_type {
        NodeType::Super => PING_SLOTS_SUPER,
        _ => PING_SLOTS_DEFAULT,
    };
    blake2b_u64(node_id.as_bytes()) % slots
}

/// Pool 1 emission for the window containing `now`, halved every 4 years
/// from `genesis_unix`.
pub fn pool1_emission_at(genesis_unix: u64, now: u64) -> u64 {
    let elapsed = now.saturating_sub(genesis_unix);
    let halvings = elapsed / POOL1_HALVING_PERIOD_SECONDS;
    let emission = POOL1_BASE_EMISSION / 2f64.powi(halvings as i32);
    emission.floor() as u64
}

/// Reward Pool Engine: owns the node registry (shared resource, written
/// only through this engine's lifecycle methods), pool balances, and
/// per-window distribution.
pub struct PoolEngine {
    genesis_unix: u64,
    nodes: Arc<DashMap<String, NodeRecord>>,
    reputation: Arc<ReputationRegistry>,
    pool_state: parking_lot::RwLock<PoolState>,
}

impl PoolEngine {
    pub fn new(genesis_unix: u64, reputation: Arc<ReputationRegistry>) -> Self {
        Self {
            genesis_unix,
            nodes: Arc::new(DashMap::new()),
            reputation,
            pool_state: parking_lot::RwLock::new(PoolState::default()),
        }
    }

    pub fn reputation(&self) -> &Arc<ReputationRegistry> {
        &self.reputation
    }

    pub fn register_node(
        &self,
        node_id: String,
        node_type: NodeType,
        owner_address: String,
        activation_epoch: u64,
        now: u64,
    ) {
        self.reputation.register_node(&node_id);
        self.nodes.insert(
            node_id.clone(),
            NodeRecord {
                node_id,
                node_type,
                owner_address,
                activation_epoch,
                last_ping_unix: now,
                status: NodeStatus::Active,
                restoration_count_window: 0,
                restoration_window_started: now,
            },
        );
    }

    pub fn node(&self, node_id: &str) -> Option<NodeRecord> {
        self.nodes.get(node_id).map(|n| n.clone())
    }

    /// Record a successful ping response within `node_id`'s assigned slot.
    pub fn record_ping(&self, node_id: &str, now: u64) -> Result<(), PoolError> {
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| PoolError::UnknownNode(node_id.to_string()))?;
        node.last_ping_unix = now;
        if let NodeStatus::Quarantined { until } = node.status {
            if now >= until {
                node.status = NodeStatus::Active;
            }
        }
        Ok(())
    }

    /// Reputation threshold required for `node_type` to receive new rewards.
    fn min_reputation_for(node_type: NodeType) -> f64 {
        match node_type {
            NodeType::Light => MIN_REPUTATION_LIGHT,
            NodeType::Full | NodeType::Super => MIN_REPUTATION_FULL_SUPER,
        }
    }

    /// Eligibility for window `w`: responded within its slot, status
    /// `Active`, reputation threshold met for its node type.
    fn is_eligible(&self, node: &NodeRecord, window_start: u64, window_end: u64) -> bool {
        if !matches!(node.status, NodeStatus::Active) {
            return false;
        }
        if self.reputation.score(&node.node_id) < Self::min_reputation_for(node.node_type) {
            return false;
        }
        node.last_ping_unix >= window_start && node.last_ping_unix < window_end
    }

    /// Sweep for nodes offline beyond `INACTIVE_THRESHOLD_SECONDS`: move
    /// them to `Pruned`. Records are preserved, not removed.
    pub fn sweep_inactive(&self, now: u64) {
        for mut entry in self.nodes.iter_mut() {
            if matches!(entry.status, NodeStatus::Active)
                && now.saturating_sub(entry.last_ping_unix) > INACTIVE_THRESHOLD_SECONDS
            {
                tracing::info!(node_id = %entry.node_id, "node pruned for inactivity");
                entry.status = NodeStatus::Pruned;
            }
        }
    }

    /// Restore a `Pruned` node, applying the mobile-friendly free-restore
    /// rule when it still qualifies, else requiring paid reactivation
    /// (signalled by `paid = true`, caller has already collected payment).
    pub fn restore_node(&self, node_id: &str, now: u64, paid: bool) -> Result<(), PoolError> {
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| PoolError::UnknownNode(node_id.to_string()))?;

        if now.saturating_sub(node.restoration_window_started) > RESTORE_WINDOW_SECONDS {
            node.restoration_count_window = 0;
            node.restoration_window_started = now;
        }

        let absence = now.saturating_sub(node.last_ping_unix);
        let free_eligible = !paid
            && self.reputation.score(node_id) >= 10.0
            && absence < REACTIVATION_REQUIRED_AFTER_SECONDS
            && node.restoration_count_window < MAX_FREE_RESTORATIONS;

        if free_eligible {
            self.reputation.set_score(node_id, 25.0).ok();
            node.status = NodeStatus::Quarantined {
                until: now + QUARANTINE_DURATION_SECONDS,
            };
            node.restoration_count_window += 1;
            tracing::info!(node_id = %node.node_id, "node freely restored into quarantine");
        } else {
            node.status = NodeStatus::Active;
            tracing::info!(node_id = %node.node_id, "node reactivated (paid)");
        }
        node.last_ping_unix = now;
        Ok(())
    }

    pub fn quarantine_node(&self, node_id: &str, duration_seconds: u64, now: u64) -> Result<(), PoolError> {
        if duration_seconds == 0 {
            return Err(PoolError::InvalidQuarantineDuration);
        }
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| PoolError::UnknownNode(node_id.to_string()))?;
        node.status = NodeStatus::Quarantined {
            until: now + duration_seconds,
        };
        Ok(())
    }

    pub fn ban_node(&self, node_id: &str) -> Result<(), PoolError> {
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| PoolError::UnknownNode(node_id.to_string()))?;
        node.status = NodeStatus::Banned;
        tracing::warn!(node_id = %node.node_id, "node banned");
        Ok(())
    }

    pub fn credit_pool2_fees(&self, amount: u64) {
        self.pool_state.write().pool2_fees += amount;
    }

    pub fn credit_pool3_activation(&self, amount: u64) {
        self.pool_state.write().pool3_activation += amount;
    }

    pub fn pool_state(&self) -> PoolState {
        self.pool_state.read().clone()
    }

    /// Distribution algorithm, spec.md §4.C.3. `window_start`/`window_end`
    /// bound the ping responses counted eligible for this window;
    /// `phase2_active` gates Pool 3 (disabled in Phase 1).
    pub fn distribute_window(
        &self,
        now: u64,
        window_start: u64,
        window_end: u64,
        phase2_active: bool,
    ) -> WindowDistribution {
        let mut pool_state = self.pool_state.write();
        pool_state.pool1_base = pool1_emission_at(self.genesis_unix, now);
        if !phase2_active {
            pool_state.pool3_activation = 0;
        }

        let eligible: Vec<NodeRecord> = self
            .nodes
            .iter()
            .map(|e| e.value().clone())
            .filter(|n| self.is_eligible(n, window_start, window_end))
            .collect();

        let mut credits: HashMap<String, u64> = HashMap::new();
        let mut pool1_distributed = 0u64;
        let mut pool2_distributed = 0u64;
        let mut pool3_distributed = 0u64;

        if !eligible.is_empty() {
            let base_share = pool_state.pool1_base / eligible.len() as u64;
            let pool3_share = if phase2_active {
                pool_state.pool3_activation / eligible.len() as u64
            } else {
                0
            };

            let super_count = eligible.iter().filter(|n| n.node_type == NodeType::Super).count() as u64;
            let full_count = eligible.iter().filter(|n| n.node_type == NodeType::Full).count() as u64;
            let super_share = if super_count > 0 {
                (pool_state.pool2_fees * 70 / 100) / super_count
            } else {
                0
            };
            let full_share = if full_count > 0 {
                (pool_state.pool2_fees * 30 / 100) / full_count
            } else {
                0
            };

            for node in &eligible {
                let pool2_share = match node.node_type {
                    NodeType::Super => super_share,
                    NodeType::Full => full_share,
                    NodeType::Light => 0,
                };
                let total = base_share + pool2_share + pool3_share;
                credits.insert(node.node_id.clone(), total);
                pool1_distributed += base_share;
                pool2_distributed += pool2_share;
                pool3_distributed += pool3_share;
            }
        }

        pool_state.pool2_fees = pool_state.pool2_fees.saturating_sub(pool2_distributed);
        pool_state.pool3_activation = pool_state.pool3_activation.saturating_sub(pool3_distributed);
        pool_state.window_index += 1;
        pool_state.last_distribution_unix = now;

        tracing::info!(
            window_index = pool_state.window_index,
            eligible = eligible.len(),
            pool1_distributed,
            pool2_distributed,
            pool3_distributed,
            "reward window distributed"
        );

        WindowDistribution {
            window_index: pool_state.window_index,
            credits,
            pool1_distributed,
            pool2_distributed,
            pool3_distributed,
        }
    }
}
