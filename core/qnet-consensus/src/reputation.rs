//! Reputation Registry (component A): a bounded `[0,100]` score per node,
//! mutated only by signed-delta events. The registry never mutates node
//! status itself — when an event drives a score below the ban threshold it
//! surfaces a [`BanRequest`] for the Reward Pool Engine / consensus layer to
//! act on.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Events the registry accepts, each with a fixed signed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReputationEventKind {
    ParticipatedCommit,
    ParticipatedReveal,
    MissedPing,
    AttackDetected,
    DoubleSign,
    Spam,
}

impl ReputationEventKind {
    fn delta(self) -> f64 {
        match self {
            ReputationEventKind::ParticipatedCommit => 1.0,
            ReputationEventKind::ParticipatedReveal => 1.0,
            ReputationEventKind::MissedPing => -2.0,
            ReputationEventKind::Spam => -10.0,
            ReputationEventKind::AttackDetected => -30.0,
            ReputationEventKind::DoubleSign => -50.0,
        }
    }

    fn is_violation(self) -> bool {
        matches!(
            self,
            ReputationEventKind::MissedPing
                | ReputationEventKind::AttackDetected
                | ReputationEventKind::DoubleSign
                | ReputationEventKind::Spam
        )
    }
}

/// A single applied reputation event, kept for audit and idempotency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationEvent {
    pub node_id: String,
    pub event_id: String,
    pub event: ReputationEventKind,
    pub delta: f64,
    pub applied_at: u64,
}

/// Raised when a node's score crosses the ban threshold. The registry only
/// raises the request — C/D own the actual status mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRequest {
    pub node_id: String,
    pub reason: String,
    pub evidence: Vec<String>,
    pub raised_at: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReputationError {
    #[error("unknown node: {0}")]
    UnknownNode(String),
}

#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub initial_score: f64,
    /// Multiplicative decay toward `initial_score` applied per window.
    pub decay_factor: f64,
    pub ban_threshold: f64,
    /// Size of the per-node ring buffer of recently-applied event ids, used
    /// to make `apply_event` idempotent.
    pub event_history: usize,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            initial_score: 70.0,
            decay_factor: 0.95,
            ban_threshold: 10.0,
            event_history: 64,
        }
    }
}

struct NodeState {
    score: f64,
    recent_event_ids: VecDeque<String>,
}

/// Reputation Registry. Lock-free reads/writes via `DashMap`, matching the
/// teacher's concurrency approach for data structures hit on every round.
pub struct ReputationRegistry {
    config: ReputationConfig,
    nodes: Arc<DashMap<String, NodeState>>,
}

impl ReputationRegistry {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            config,
            nodes: Arc::new(DashMap::new()),
        }
    }

    pub fn score(&self, node_id: &str) -> f64 {
        self.nodes
            .get(node_id)
            .map(|s| s.score)
            .unwrap_or(self.config.initial_score)
    }

    pub fn is_known(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Register `node_id` at the baseline score. Idempotent: re-registering
    /// an already-known node is a no-op. This is the registry's sole entry
    /// point for a node becoming known to A — every other component that
    /// needs a fresh `NodeState` (the Reward Pool Engine's activation flow,
    /// chiefly) calls through here rather than inserting its own.
    pub fn register_node(&self, node_id: &str) {
        self.nodes.entry(node_id.to_string()).or_insert_with(|| NodeState {
            score: self.config.initial_score,
            recent_event_ids: VecDeque::new(),
        });
    }

    /// Apply `event` for `node_id`, identified by `event_id`. Idempotent:
    /// replaying an already-applied `(node_id, event_id)` pair is a no-op
    /// that returns the current score unchanged. Fails with `UnknownNode`
    /// for any `node_id` that was never registered (spec.md §4.A) — the
    /// registry never silently admits a node through event ingestion.
    pub fn apply_event(
        &self,
        node_id: &str,
        event_id: &str,
        event: ReputationEventKind,
        now: u64,
    ) -> Result<(f64, Option<BanRequest>), ReputationError> {
        let mut entry = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ReputationError::UnknownNode(node_id.to_string()))?;

        if entry.recent_event_ids.iter().any(|seen| seen == event_id) {
            tracing::debug!(node_id, event_id, "duplicate reputation event absorbed");
            return Ok((entry.score, None));
        }

        let delta = event.delta();
        entry.score = (entry.score + delta).clamp(MIN_SCORE, MAX_SCORE);
        entry.recent_event_ids.push_back(event_id.to_string());
        if entry.recent_event_ids.len() > self.config.event_history {
            entry.recent_event_ids.pop_front();
        }
        let new_score = entry.score;

        if event.is_violation() {
            tracing::warn!(node_id, ?event, new_score, "reputation violation applied");
        } else {
            tracing::debug!(node_id, ?event, new_score, "reputation event applied");
        }

        let ban_request = if new_score < self.config.ban_threshold {
            Some(BanRequest {
                node_id: node_id.to_string(),
                reason: format!("{event:?}"),
                evidence: vec![event_id.to_string()],
                raised_at: now,
            })
        } else {
            None
        };

        Ok((new_score, ban_request))
    }

    /// Directly set `node_id`'s score, used by the Reward Pool Engine's
    /// free-restoration lifecycle (component C, spec.md §4.C.4) to apply
    /// its fixed reset. Still routed through the registry so A remains the
    /// sole writer of node scores (spec.md §5).
    pub fn set_score(&self, node_id: &str, score: f64) -> Result<(), ReputationError> {
        let mut entry = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ReputationError::UnknownNode(node_id.to_string()))?;
        entry.score = score.clamp(MIN_SCORE, MAX_SCORE);
        Ok(())
    }

    /// Periodic exponential decay toward `initial_score`, applied once per
    /// reward window. Scores below the baseline are left untouched — decay
    /// only pulls elevated scores back down, recovery toward the baseline
    /// from below happens through participation events, not decay.
    pub fn decay(&self, _now: u64) {
        for mut entry in self.nodes.iter_mut() {
            if entry.score > self.config.initial_score {
                let excess = entry.score - self.config.initial_score;
                entry.score -= excess * (1.0 - self.config.decay_factor);
            }
        }
    }

    pub fn is_eligible(&self, node_id: &str, threshold: f64) -> bool {
        self.score(node_id) >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_node_is_rejected() {
        let registry = ReputationRegistry::new(ReputationConfig::default());
        let res = registry.apply_event("ghost", "evt-1", ReputationEventKind::MissedPing, 1000);
        assert_eq!(res, Err(ReputationError::UnknownNode("ghost".to_string())));
    }

    #[test]
    fn duplicate_event_id_is_absorbed() {
        let registry = ReputationRegistry::new(ReputationConfig::default());
        registry.register_node("node-1");
        let (first, _) = registry.apply_event("node-1", "evt-1", ReputationEventKind::MissedPing, 1000).unwrap();
        let (second, _) = registry.apply_event("node-1", "evt-1", ReputationEventKind::MissedPing, 1000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn score_is_clamped_to_bounds() {
        let registry = ReputationRegistry::new(ReputationConfig::default());
        registry.register_node("node-1");
        for i in 0..200 {
            registry.apply_event("node-1", &format!("evt-{i}"), ReputationEventKind::ParticipatedCommit, 1000).unwrap();
        }
        assert_eq!(registry.score("node-1"), MAX_SCORE);
    }

    #[test]
    fn crossing_ban_threshold_raises_request() {
        let registry = ReputationRegistry::new(ReputationConfig::default());
        registry.register_node("node-1");
        let mut last_request = None;
        for i in 0..10 {
            let (_, req) = registry.apply_event("node-1", &format!("evt-{i}"), ReputationEventKind::DoubleSign, 1000).unwrap();
            if req.is_some() {
                last_request = req;
            }
        }
        assert!(last_request.is_some());
        assert_eq!(last_request.unwrap().node_id, "node-1");
    }

    #[test]
    fn decay_pulls_elevated_score_toward_baseline_only() {
        let registry = ReputationRegistry::new(ReputationConfig::default());
        registry.register_node("node-1");
        for i in 0..50 {
            registry.apply_event("node-1", &format!("evt-{i}"), ReputationEventKind::ParticipatedCommit, 1000).unwrap();
        }
        let before = registry.score("node-1");
        assert!(before > 70.0);
        registry.decay(2000);
        let after = registry.score("node-1");
        assert!(after < before);
        assert!(after >= 70.0);
    }

    #[test]
    fn set_score_requires_known_node() {
        let registry = ReputationRegistry::new(ReputationConfig::default());
        assert_eq!(
            registry.set_score("ghost", 25.0),
            Err(ReputationError::UnknownNode("ghost".to_string()))
        );
        registry.register_node("node-1");
        registry.set_score("node-1", 25.0).unwrap();
        assert_eq!(registry.score("node-1"), 25.0);
    }
}
