//! Phase & Activation Ledger (component B): tracks every node activation
//! and the global Phase-1 → Phase-2 transition.

use qnet_state::NodeType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;
const TRANSITION_BURN_RATIO: f64 = 0.9;
const TRANSITION_MAX_YEARS: f64 = 5.0;

/// Genesis bootstrap codes admitted at `paid_amount = 0`, pinned to exactly
/// five entries (see DESIGN.md Open Question decisions).
pub const GENESIS_ACTIVATION_CODES: [&str; 5] = [
    "QNET-BOOT-0001-STRAP",
    "QNET-BOOT-0002-STRAP",
    "QNET-BOOT-0003-STRAP",
    "QNET-BOOT-0004-STRAP",
    "QNET-BOOT-0005-STRAP",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Phase1,
    Phase2,
}

/// One recorded node activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationEntry {
    pub node_id: String,
    pub owner_address: String,
    pub node_type: NodeType,
    pub phase: Phase,
    pub paid_amount: u64,
    pub proof: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseState {
    pub phase: Phase,
    pub phase1_total_burned: u64,
    pub phase1_total_supply: u64,
    pub phase1_launch_unix: u64,
    pub transitioned_at: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub transitioned_at: u64,
    pub grace_window_ends: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("proof already used: {0}")]
    DuplicateProof(String),
    #[error("insufficient payment: required {required}, given {given}")]
    InsufficientPayment { required: u64, given: u64 },
    #[error("owner already has an active node")]
    OwnerAlreadyActive,
    #[error("activation not permitted in the current phase")]
    WrongPhase,
    #[error("unknown node type")]
    UnknownNodeType,
    #[error("node not found: {0}")]
    UnknownNode(String),
    #[error("migration window has closed or was never open")]
    MigrationWindowClosed,
}

/// Migration grace window after a Phase-2 transition, during which
/// Phase-1 nodes may re-register for free.
const MIGRATION_GRACE_SECONDS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    pub phase1_base: u64,
    pub phase1_step: u64,
    pub phase1_floor: u64,
    pub phase2_base_light: u64,
    pub phase2_base_full: u64,
    pub phase2_base_super: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            phase1_base: 1500,
            phase1_step: 150,
            phase1_floor: 150,
            phase2_base_light: 5000,
            phase2_base_full: 7500,
            phase2_base_super: 10000,
        }
    }
}

/// The Phase & Activation Ledger. Single-writer (guarded by a reentrant
/// mutex at the composition root, per the concurrency model); reads of
/// `phase_state` are cheap clones.
pub struct PhaseLedger {
    pricing: PricingConfig,
    state: PhaseState,
    used_proofs: HashSet<String>,
    active_owners: HashSet<String>,
    entries: HashMap<String, ActivationEntry>,
    active_node_counts: HashMap<NodeType, u64>,
}

impl PhaseLedger {
    pub fn new(phase1_launch_unix: u64, phase1_total_supply: u64, pricing: PricingConfig) -> Self {
        Self {
            pricing,
            state: PhaseState {
                phase: Phase::Phase1,
                phase1_total_burned: 0,
                phase1_total_supply,
                phase1_launch_unix,
                transitioned_at: None,
            },
            used_proofs: HashSet::new(),
            active_owners: HashSet::new(),
            entries: HashMap::new(),
            active_node_counts: HashMap::new(),
        }
    }

    pub fn phase_state(&self) -> PhaseState {
        self.state.clone()
    }

    fn total_active_nodes(&self) -> u64 {
        self.active_node_counts.values().sum()
    }

    /// Price function, spec.md §4.B.1.
    pub fn current_price(&self, node_type: NodeType) -> u64 {
        match self.state.phase {
            Phase::Phase1 => {
                let burn_ratio = if self.state.phase1_total_supply == 0 {
                    0.0
                } else {
                    self.state.phase1_total_burned as f64 / self.state.phase1_total_supply as f64
                };
                let steps = (burn_ratio * 10.0).floor() as u64;
                let price = self.pricing.phase1_base.saturating_sub(steps * self.pricing.phase1_step);
                price.max(self.pricing.phase1_floor)
            }
            Phase::Phase2 => {
                let base = match node_type {
                    NodeType::Light => self.pricing.phase2_base_light,
                    NodeType::Full => self.pricing.phase2_base_full,
                    NodeType::Super => self.pricing.phase2_base_super,
                };
                let tier = network_size_tier(self.total_active_nodes());
                (base as f64 * tier) as u64
            }
        }
    }

    pub fn record_activation(
        &mut self,
        node_id: String,
        owner_address: String,
        node_type: NodeType,
        paid_amount: u64,
        proof: String,
        timestamp: u64,
    ) -> Result<String, ActivationError> {
        if self.used_proofs.contains(&proof) {
            return Err(ActivationError::DuplicateProof(proof));
        }
        if self.active_owners.contains(&owner_address) {
            return Err(ActivationError::OwnerAlreadyActive);
        }

        let is_genesis = GENESIS_ACTIVATION_CODES.contains(&proof.as_str());
        if !is_genesis {
            let required = self.current_price(node_type);
            if paid_amount < required {
                return Err(ActivationError::InsufficientPayment {
                    required,
                    given: paid_amount,
                });
            }
        }

        let phase = self.state.phase;
        if phase == Phase::Phase1 {
            self.state.phase1_total_burned = self.state.phase1_total_burned.saturating_add(paid_amount);
        }

        self.used_proofs.insert(proof.clone());
        self.active_owners.insert(owner_address.clone());
        *self.active_node_counts.entry(node_type).or_insert(0) += 1;

        self.entries.insert(
            node_id.clone(),
            ActivationEntry {
                node_id: node_id.clone(),
                owner_address,
                node_type,
                phase,
                paid_amount: if is_genesis { 0 } else { paid_amount },
                proof,
                timestamp,
            },
        );

        tracing::info!(node_id, ?node_type, ?phase, "node activated");
        Ok(node_id)
    }

    /// Checks the transition condition and flips the phase exactly once.
    /// Idempotent: calling again after a transition is a no-op returning
    /// `None`.
    pub fn maybe_transition(&mut self, now: u64) -> Option<PhaseTransition> {
        if self.state.phase == Phase::Phase2 {
            return None;
        }

        let burn_ratio = if self.state.phase1_total_supply == 0 {
            0.0
        } else {
            self.state.phase1_total_burned as f64 / self.state.phase1_total_supply as f64
        };
        let years_elapsed = (now.saturating_sub(self.state.phase1_launch_unix)) as f64 / SECONDS_PER_YEAR as f64;

        if burn_ratio >= TRANSITION_BURN_RATIO || years_elapsed >= TRANSITION_MAX_YEARS {
            self.state.phase = Phase::Phase2;
            self.state.transitioned_at = Some(now);
            tracing::info!(now, burn_ratio, years_elapsed, "phase transitioned to Phase2");
            return Some(PhaseTransition {
                transitioned_at: now,
                grace_window_ends: now + MIGRATION_GRACE_SECONDS,
            });
        }
        None
    }

    /// Free migration for a Phase-1 node, valid only within the grace
    /// window following transition.
    pub fn migrate_phase1_node(&mut self, node_id: &str, now: u64) -> Result<(), ActivationError> {
        let transitioned_at = self
            .state
            .transitioned_at
            .ok_or(ActivationError::MigrationWindowClosed)?;
        if now > transitioned_at + MIGRATION_GRACE_SECONDS {
            return Err(ActivationError::MigrationWindowClosed);
        }

        let entry = self
            .entries
            .get(node_id)
            .ok_or_else(|| ActivationError::UnknownNode(node_id.to_string()))?;
        if entry.phase != Phase::Phase1 {
            return Err(ActivationError::WrongPhase);
        }

        let migration_proof = format!("MIGRATION_{node_id}");
        if self.used_proofs.contains(&migration_proof) {
            return Err(ActivationError::DuplicateProof(migration_proof));
        }
        self.used_proofs.insert(migration_proof.clone());

        if let Some(e) = self.entries.get_mut(node_id) {
            e.phase = Phase::Phase2;
            e.proof = migration_proof;
            e.timestamp = now;
        }
        tracing::info!(node_id, "migrated Phase-1 node to Phase-2 during grace window");
        Ok(())
    }

    pub fn entry(&self, node_id: &str) -> Option<&ActivationEntry> {
        self.entries.get(node_id)
    }
}

fn network_size_tier(active_nodes: u64) -> f64 {
    if active_nodes < 100_000 {
        0.5
    } else if active_nodes < 1_000_000 {
        1.0
    } else if active_nodes < 10_000_000 {
        2.0
    } else {
        3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase1_price_steps_down_with_burn_ratio() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        assert_eq!(ledger.current_price(NodeType::Light), 1500);

        ledger.state.phase1_total_burned = 420_000; // 42% burned -> 4 steps
        assert_eq!(ledger.current_price(NodeType::Light), 1500 - 4 * 150);
    }

    #[test]
    fn phase1_price_floors_at_150() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        ledger.state.phase1_total_burned = 1_000_000;
        assert_eq!(ledger.current_price(NodeType::Light), 150);
    }

    #[test]
    fn genesis_code_bypasses_pricing() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        let res = ledger.record_activation(
            "node-1".into(),
            "owner-1".into(),
            NodeType::Super,
            0,
            GENESIS_ACTIVATION_CODES[0].to_string(),
            1000,
        );
        assert!(res.is_ok());
        assert_eq!(ledger.entry("node-1").unwrap().paid_amount, 0);
    }

    #[test]
    fn duplicate_proof_rejected() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        ledger
            .record_activation("node-1".into(), "owner-1".into(), NodeType::Light, 1500, "proof-1".into(), 1000)
            .unwrap();
        let res = ledger.record_activation("node-2".into(), "owner-2".into(), NodeType::Light, 1500, "proof-1".into(), 1000);
        assert_eq!(res, Err(ActivationError::DuplicateProof("proof-1".into())));
    }

    #[test]
    fn one_wallet_one_node() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        ledger
            .record_activation("node-1".into(), "owner-1".into(), NodeType::Light, 1500, "proof-1".into(), 1000)
            .unwrap();
        let res = ledger.record_activation("node-2".into(), "owner-1".into(), NodeType::Light, 1500, "proof-2".into(), 1000);
        assert_eq!(res, Err(ActivationError::OwnerAlreadyActive));
    }

    #[test]
    fn transition_triggers_on_burn_ratio() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        ledger.state.phase1_total_burned = 900_000;
        let transition = ledger.maybe_transition(1000);
        assert!(transition.is_some());
        assert_eq!(ledger.phase_state().phase, Phase::Phase2);
        assert_eq!(ledger.maybe_transition(2000), None);
    }

    #[test]
    fn transition_triggers_after_five_years() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        let five_years = 5 * SECONDS_PER_YEAR;
        assert!(ledger.maybe_transition(five_years).is_some());
    }

    #[test]
    fn migration_only_valid_inside_grace_window() {
        let mut ledger = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        ledger
            .record_activation("node-1".into(), "owner-1".into(), NodeType::Light, 1500, "proof-1".into(), 1000)
            .unwrap();
        let transition = ledger.maybe_transition(5 * SECONDS_PER_YEAR).unwrap();

        assert!(ledger.migrate_phase1_node("node-1", transition.transitioned_at + 10).is_ok());

        let mut ledger2 = PhaseLedger::new(0, 1_000_000, PricingConfig::default());
        ledger2
            .record_activation("node-1".into(), "owner-1".into(), NodeType::Light, 1500, "proof-1".into(), 1000)
            .unwrap();
        let transition2 = ledger2.maybe_transition(5 * SECONDS_PER_YEAR).unwrap();
        let res = ledger2.migrate_phase1_node("node-1", transition2.grace_window_ends + 1);
        assert_eq!(res, Err(ActivationError::MigrationWindowClosed));
    }
}
