//! Commit-Reveal consensus (component D): Idle → Commit → Reveal →
//! Finalized → Idle, with leader election by sorted-reveal-hash beacon.

use std::collections::HashMap;
use std::sync::Arc;

use qnet_core::envelope::VerifySurface;
use serde::{Deserialize, Serialize};

use crate::errors::{ConsensusError, ConsensusResult};
use crate::leader_selection::select_leader;
use crate::reputation::{BanRequest, ReputationEventKind, ReputationRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Idle,
    Commit,
    Reveal,
    Finalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_number: u64,
    pub winner: Option<String>,
    pub participants: Vec<String>,
}

struct Round {
    round_number: u64,
    phase: RoundPhase,
    eligible_nodes: Vec<String>,
    start_unix: u64,
    commit_deadline: u64,
    reveal_deadline: u64,
    commits: HashMap<String, Vec<u8>>,
    reveals: HashMap<String, String>,
    difficulty: u64,
}

/// Commit-Reveal consensus engine. Signature verification for every
/// commit/reveal is delegated to the injected [`VerifySurface`] — in
/// production this is the same Security Envelope instance (component G)
/// that gates every other ingress path, never a verifier this module owns
/// independently.
pub struct CommitRevealConsensus {
    verifier: Arc<dyn VerifySurface>,
    reputation: Arc<ReputationRegistry>,
    current_round: Option<Round>,
    next_round_number: u64,
}

impl CommitRevealConsensus {
    pub fn new(verifier: Arc<dyn VerifySurface>, reputation: Arc<ReputationRegistry>) -> Self {
        Self {
            verifier,
            reputation,
            current_round: None,
            next_round_number: 1,
        }
    }

    pub fn start_round(
        &mut self,
        eligible_nodes: Vec<String>,
        now: u64,
        commit_duration_seconds: u64,
        reveal_duration_seconds: u64,
        difficulty: u64,
    ) -> ConsensusResult<u64> {
        if eligible_nodes.len() < 3 {
            return Err(ConsensusError::InsufficientNodes {
                need: 3,
                have: eligible_nodes.len(),
            });
        }
        let round_number = self.next_round_number;
        self.next_round_number += 1;

        self.current_round = Some(Round {
            round_number,
            phase: RoundPhase::Commit,
            eligible_nodes,
            start_unix: now,
            commit_deadline: now + commit_duration_seconds,
            reveal_deadline: now + commit_duration_seconds + reveal_duration_seconds,
            commits: HashMap::new(),
            reveals: HashMap::new(),
            difficulty,
        });
        Ok(round_number)
    }

    /// Submit a commit. Valid iff `phase=Commit`, `now <= commit_deadline`,
    /// the signature over `"r:{hash}"` verifies under `node_id`'s public
    /// key, the node is in the eligible set, and it has not already
    /// committed this round. A second commit from a node already on record
    /// this round is treated as `DoubleSign` (spec.md §4.D.4): reputation
    /// absorbs the violation and any resulting ban request is returned for
    /// the caller to act on.
    pub fn submit_commit(
        &mut self,
        node_id: &str,
        hash: &[u8],
        signature: &[u8],
        public_key: &[u8],
        now: u64,
    ) -> ConsensusResult<Option<BanRequest>> {
        let round = self.current_round.as_mut().ok_or(ConsensusError::NoActiveRound)?;

        if round.phase != RoundPhase::Commit {
            return Err(ConsensusError::WrongPhase("not in commit phase".into()));
        }
        if now > round.commit_deadline {
            return Err(ConsensusError::DeadlineExceeded("commit deadline passed".into()));
        }
        if !round.eligible_nodes.iter().any(|n| n == node_id) {
            return Err(ConsensusError::NotEligible(node_id.to_string()));
        }
        if round.commits.contains_key(node_id) {
            let event_id = format!("round-{}-doublesign-{}", round.round_number, round.commits.len());
            let ban_request = self
                .reputation
                .apply_event(node_id, &event_id, ReputationEventKind::DoubleSign, now)
                .ok()
                .and_then(|(_, ban)| ban);
            return Err(ConsensusError::DuplicateCommit {
                node_id: node_id.to_string(),
                ban_request: ban_request.map(Box::new),
            });
        }

        let mut message = b"r:".to_vec();
        message.extend_from_slice(hash);
        self.verifier
            .verify(&message, signature, public_key)
            .map_err(|e| ConsensusError::InvalidSignature(e.to_string()))?;

        round.commits.insert(node_id.to_string(), hash.to_vec());

        if round.commits.len() >= round.eligible_nodes.len() {
            round.phase = RoundPhase::Reveal;
        }

        let event_id = format!("round-{}-commit-{node_id}", round.round_number);
        let (_, ban_request) = self
            .reputation
            .apply_event(node_id, &event_id, ReputationEventKind::ParticipatedCommit, now)
            .unwrap_or((0.0, None));
        Ok(ban_request)
    }

    /// Submit a reveal. Valid iff `phase=Reveal`, `now <= reveal_deadline`,
    /// `value` hashes to the node's committed hash, node previously
    /// committed, and hasn't already revealed.
    pub fn submit_reveal(&mut self, node_id: &str, value: &str, now: u64) -> ConsensusResult<()> {
        let round = self.current_round.as_mut().ok_or(ConsensusError::NoActiveRound)?;

        if round.phase != RoundPhase::Reveal {
            return Err(ConsensusError::WrongPhase("not in reveal phase".into()));
        }
        if now > round.reveal_deadline {
            return Err(ConsensusError::DeadlineExceeded("reveal deadline passed".into()));
        }
        let committed_hash = round
            .commits
            .get(node_id)
            .ok_or_else(|| ConsensusError::InvalidReveal(format!("no commit from {node_id}")))?;
        if round.reveals.contains_key(node_id) {
            return Err(ConsensusError::InvalidReveal("already revealed".into()));
        }

        let computed = qnet_core::hash::hash256(value.as_bytes());
        if &computed[..] != committed_hash.as_slice() {
            return Err(ConsensusError::InvalidReveal("reveal does not match commit".into()));
        }

        round.reveals.insert(node_id.to_string(), value.to_string());

        let round_number = round.round_number;
        let event_id = format!("round-{round_number}-reveal-{node_id}");
        self.reputation
            .apply_event(node_id, &event_id, ReputationEventKind::ParticipatedReveal, now)
            .ok();
        Ok(())
    }

    /// Finalize the round (spec.md §4.D.1): eligible once `|reveals| >=
    /// max(ceil(min_reveals_ratio * |commits|), min_participants)`, once
    /// `now >= reveal_deadline`, or once `now >= start + max_round_time`
    /// (forced). Insufficient reveals at that point still finalize the
    /// round, just with `winner = None` (spec.md §4.D.4) — the caller
    /// decides whether to start a fresh round.
    pub fn finalize_round(
        &mut self,
        now: u64,
        min_reveals_ratio: f64,
        min_participants: usize,
        max_round_time_seconds: u64,
    ) -> ConsensusResult<RoundResult> {
        let round = self.current_round.as_mut().ok_or(ConsensusError::NoActiveRound)?;

        let quorum = ((min_reveals_ratio * round.commits.len() as f64).ceil() as usize).max(min_participants);
        let quorum_met = round.reveals.len() >= quorum;
        let deadline_reached = now >= round.reveal_deadline;
        let forced = now >= round.start_unix + max_round_time_seconds;

        if !quorum_met && !deadline_reached && !forced {
            return Err(ConsensusError::NotReadyToFinalize {
                have: round.reveals.len(),
                need: quorum,
            });
        }

        let winner = if round.reveals.is_empty() {
            None
        } else {
            let mut eligible_sorted = round.eligible_nodes.clone();
            eligible_sorted.sort();

            let reveal_pairs: Vec<(String, String)> = round
                .reveals
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            select_leader(&reveal_pairs, &eligible_sorted, round.difficulty)
        };
        let result = RoundResult {
            round_number: round.round_number,
            winner,
            participants: round.reveals.keys().cloned().collect(),
        };
        round.phase = RoundPhase::Finalized;
        Ok(result)
    }

    pub fn phase(&self) -> RoundPhase {
        self.current_round.as_ref().map(|r| r.phase).unwrap_or(RoundPhase::Idle)
    }

    pub fn reset(&mut self) {
        self.current_round = None;
    }
}
