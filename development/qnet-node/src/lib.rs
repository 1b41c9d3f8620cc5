//! QNet node composition root: wires the core crates (state, mempool,
//! consensus, sharding) behind the security envelope and block pipeline
//! into one runnable node, per spec.md §4/§5.

pub mod config;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod store;

use std::sync::Arc;

use parking_lot::Mutex;
use qnet_consensus::{
    CommitRevealConsensus, DynamicTiming, PhaseLedger, PoolEngine, PricingConfig, ReputationConfig,
    ReputationRegistry,
};
use qnet_core::envelope::{SignatureAlgorithm, VerifierRegistry, VerifySurface};
use qnet_mempool::{Mempool, MempoolConfig};
use qnet_sharding::{CrossShardManager, ShardCoordinator};
use qnet_state::StateManager;

pub use config::NodeConfig;
pub use errors::{NodeError, NodeResult};
pub use events::{EventBus, EventSubscriber, NodeEvent};
pub use pipeline::BlockPipeline;
pub use store::{namespaces, InMemoryStore, Store};

/// The running node: every component the pipeline and RPC surface touch,
/// reachable behind `Arc`/interior-mutability so actors can share handles
/// without cloning state (SPEC_FULL §5).
pub struct QNetNode {
    pub config: NodeConfig,
    pub state: Arc<StateManager>,
    pub mempool: Arc<Mempool>,
    pub consensus: Arc<Mutex<CommitRevealConsensus>>,
    pub reputation: Arc<ReputationRegistry>,
    pub pools: Arc<PoolEngine>,
    pub phase: Arc<Mutex<PhaseLedger>>,
    pub shards: Arc<ShardCoordinator>,
    pub cross_shard: Arc<CrossShardManager>,
    pub envelope: Arc<envelope::SecurityEnvelope>,
    pub pipeline: Arc<BlockPipeline>,
    pub timing: Mutex<DynamicTiming>,
    pub events: EventBus,
    subscriber: Mutex<Option<EventSubscriber>>,
    running: std::sync::atomic::AtomicBool,
    round_started_unix: std::sync::atomic::AtomicU64,
}

impl QNetNode {
    /// Assemble every component from `config`, wiring the block pipeline
    /// and security envelope around shared state. `verifiers`/`algorithm`
    /// are supplied by the host, since concrete signature schemes are not
    /// this crate's concern (component G delegates entirely).
    pub fn new(
        config: NodeConfig,
        store: Arc<dyn Store>,
        verifiers: VerifierRegistry,
        algorithm: SignatureAlgorithm,
        genesis_unix: u64,
    ) -> Self {
        let state = Arc::new(StateManager::new());
        let mempool = Arc::new(Mempool::new(MempoolConfig::default(), state.clone()));

        let reputation = Arc::new(ReputationRegistry::new(ReputationConfig::default()));
        let pools = Arc::new(PoolEngine::new(genesis_unix, reputation.clone()));

        let envelope = Arc::new(envelope::SecurityEnvelope::new(config.envelope.clone(), verifiers, algorithm));
        let verify_surface: Arc<dyn VerifySurface> = envelope.clone();
        let consensus = Arc::new(Mutex::new(CommitRevealConsensus::new(verify_surface, reputation.clone())));

        let timing = Mutex::new(DynamicTiming::new(
            config.consensus.target_round_time_seconds,
            config.consensus.commit_window_seconds,
            config.consensus.reveal_window_seconds,
        ));

        let pricing = PricingConfig {
            phase1_base: config.phase.phase1_base_price,
            phase1_step: config.phase.phase1_step,
            phase1_floor: config.phase.phase1_floor,
            phase2_base_light: config.phase.phase2_base_prices.light,
            phase2_base_full: config.phase.phase2_base_prices.full,
            phase2_base_super: config.phase.phase2_base_prices.super_node,
        };
        let phase = Arc::new(Mutex::new(PhaseLedger::new(
            config.phase.phase1_launch_unix,
            config.phase.phase1_total_supply,
            pricing,
        )));

        let shards = Arc::new(ShardCoordinator::new(config.sharding.total_shards, config.sharding.managed_shards.clone()));
        let cross_shard = Arc::new(CrossShardManager::new(shards.clone()));

        let (events, subscriber) = EventBus::new();
        let subscriber = Mutex::new(Some(subscriber));

        let pipeline = Arc::new(BlockPipeline::new(
            config.pipeline.max_microblock_txs,
            config.pipeline.microblocks_per_macroblock,
            state.clone(),
            mempool.clone(),
            reputation.clone(),
            store,
            events.clone(),
        ));

        Self {
            config,
            state,
            mempool,
            consensus,
            reputation,
            pools,
            phase,
            shards,
            cross_shard,
            envelope,
            pipeline,
            timing,
            events,
            subscriber,
            running: std::sync::atomic::AtomicBool::new(false),
            round_started_unix: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Take the event subscriber. Callable exactly once; a second call
    /// (or a call after the host already subscribed) returns `None`.
    pub fn subscribe(&self) -> Option<EventSubscriber> {
        self.subscriber.lock().take()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn mark_started(&self) -> NodeResult<()> {
        if self.running.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return Err(NodeError::AlreadyRunning);
        }
        tracing::info!("node started");
        Ok(())
    }

    pub fn mark_stopped(&self) -> NodeResult<()> {
        if !self.running.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(NodeError::NotRunning);
        }
        tracing::info!("node stopped");
        Ok(())
    }

    /// Start a new commit-reveal round over the currently eligible node
    /// set, using the adaptive timing/difficulty this node has converged
    /// on so far (spec.md §4.D.3).
    pub fn start_round(&self, eligible_nodes: Vec<String>, now: u64) -> NodeResult<u64> {
        let timing = self.timing.lock();
        let round_timing = timing.current_timing();
        let difficulty = timing.current_difficulty();
        drop(timing);

        let mut consensus = self.consensus.lock();
        let round_number = consensus.start_round(
            eligible_nodes,
            now,
            round_timing.commit_seconds,
            round_timing.reveal_seconds,
            difficulty,
        )?;
        drop(consensus);
        self.round_started_unix.store(now, std::sync::atomic::Ordering::SeqCst);
        self.events.publish(NodeEvent::RoundFinalized { round_number, winner: None });
        Ok(round_number)
    }

    /// Submit a commit for the active round. A double-commit raises a
    /// `DoubleSign` reputation event (component A); if that event crosses
    /// the ban threshold, publish `BanRequested` here rather than leaving
    /// it buried in the returned error for the caller to notice or not.
    pub fn submit_commit(
        &self,
        node_id: &str,
        hash: &[u8],
        signature: &[u8],
        public_key: &[u8],
        now: u64,
    ) -> NodeResult<()> {
        let result = self.consensus.lock().submit_commit(node_id, hash, signature, public_key, now);
        match result {
            Ok(ban_request) => {
                if let Some(ban_request) = ban_request {
                    self.events.publish(NodeEvent::BanRequested(ban_request));
                }
                Ok(())
            }
            Err(qnet_consensus::ConsensusError::DuplicateCommit { node_id, ban_request }) => {
                if let Some(ban_request) = ban_request {
                    self.events.publish(NodeEvent::BanRequested(*ban_request));
                }
                Err(qnet_consensus::ConsensusError::DuplicateCommit { node_id, ban_request: None }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Submit a reveal for the active round.
    pub fn submit_reveal(&self, node_id: &str, value: &str, now: u64) -> NodeResult<()> {
        self.consensus.lock().submit_reveal(node_id, value, now)?;
        Ok(())
    }

    /// Finalize the active round, publish `LeaderSelected`/`RoundFinalized`,
    /// feed the round's outcome back into the adaptive timing model, and on
    /// a missing winner delegate to the pipeline's missed-leader handling
    /// (spec.md §4.F).
    pub fn finalize_round(&self, now: u64) -> NodeResult<qnet_consensus::RoundResult> {
        let result = self.consensus.lock().finalize_round(
            now,
            self.config.consensus.min_reveals_ratio,
            self.config.consensus.min_participants,
            self.config.consensus.max_round_time_seconds,
        )?;

        let started = self.round_started_unix.load(std::sync::atomic::Ordering::SeqCst);
        let duration = now.saturating_sub(started);
        self.timing.lock().record_finalized_round(duration, result.winner.is_some());

        match &result.winner {
            Some(node_id) => {
                self.events.publish(NodeEvent::LeaderSelected {
                    round_number: result.round_number,
                    node_id: node_id.clone(),
                });
            }
            None => {
                self.pipeline.record_missed_leader(
                    "unknown",
                    &format!("round-{}-no-winner", result.round_number),
                    now,
                );
            }
        }
        self.events.publish(NodeEvent::RoundFinalized {
            round_number: result.round_number,
            winner: result.winner.clone(),
        });
        Ok(result)
    }

    /// Close a reward window: run the pool engine's distribution and
    /// publish `WindowDistributed`.
    pub fn distribute_window(&self, now: u64, window_start: u64, window_end: u64) -> qnet_consensus::pools::WindowDistribution {
        let phase2_active = matches!(self.phase.lock().phase_state().phase, qnet_consensus::phase::Phase::Phase2);
        let distribution = self.pools.distribute_window(now, window_start, window_end, phase2_active);
        self.events.publish(NodeEvent::WindowDistributed {
            window_index: distribution.window_index,
            eligible_count: distribution.credits.len() as u64,
        });
        distribution
    }

    /// Check and apply a Phase-1 -> Phase-2 transition if the burn-ratio or
    /// max-years threshold has been crossed, publishing `PhaseTransitioned`.
    pub fn maybe_transition_phase(&self, now: u64) -> Option<qnet_consensus::phase::PhaseTransition> {
        let transition = self.phase.lock().maybe_transition(now);
        if let Some(transition) = transition {
            self.events.publish(NodeEvent::PhaseTransitioned { transitioned_at: transition.transitioned_at });
        }
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_core::envelope::{SignatureAlgorithm, SignatureVerifier};

    fn config() -> NodeConfig {
        NodeConfig::default()
    }

    struct AlwaysValid;
    impl SignatureVerifier for AlwaysValid {
        fn algorithm(&self) -> SignatureAlgorithm {
            SignatureAlgorithm::LatticeL3
        }
        fn verify(&self, _m: &[u8], signature: &[u8], _k: &[u8]) -> bool {
            !signature.is_empty()
        }
    }

    fn node_with_verifier() -> QNetNode {
        let mut verifiers = VerifierRegistry::new();
        verifiers.register(Box::new(AlwaysValid));
        let store = InMemoryStore::new();
        QNetNode::new(config(), store, verifiers, SignatureAlgorithm::LatticeL3, 1_700_000_000)
    }

    #[test]
    fn node_refuses_double_start() {
        let store = InMemoryStore::new();
        let node = QNetNode::new(config(), store, VerifierRegistry::new(), SignatureAlgorithm::LatticeL3, 1_700_000_000);
        node.mark_started().unwrap();
        assert!(matches!(node.mark_started(), Err(NodeError::AlreadyRunning)));
    }

    #[test]
    fn start_round_requires_minimum_participants() {
        let store = InMemoryStore::new();
        let node = QNetNode::new(config(), store, VerifierRegistry::new(), SignatureAlgorithm::LatticeL3, 1_700_000_000);
        let result = node.start_round(vec!["a".into(), "b".into()], 1_700_000_000);
        assert!(result.is_err());
    }

    #[test]
    fn commit_and_reveal_round_trip_through_node() {
        let node = node_with_verifier();
        for node_id in ["n1", "n2", "n3"] {
            node.reputation.register_node(node_id);
        }
        node.start_round(vec!["n1".into(), "n2".into(), "n3".into()], 1_700_000_000).unwrap();

        for (id, value) in [("n1", "A"), ("n2", "B"), ("n3", "C")] {
            let hash = qnet_core::hash::hash256(value.as_bytes());
            node.submit_commit(id, &hash, b"sig", b"pk", 1_700_000_000).unwrap();
        }
        for (id, value) in [("n1", "A"), ("n2", "B"), ("n3", "C")] {
            node.submit_reveal(id, value, 1_700_000_010).unwrap();
        }

        let result = node.finalize_round(1_700_000_010).unwrap();
        assert!(result.winner.is_some());
    }

    #[test]
    fn duplicate_commit_through_node_publishes_ban_request_when_present() {
        let node = node_with_verifier();
        for node_id in ["n1", "n2", "n3"] {
            node.reputation.register_node(node_id);
        }
        node.start_round(vec!["n1".into(), "n2".into(), "n3".into()], 1_700_000_000).unwrap();

        let hash = qnet_core::hash::hash256(b"A");
        node.submit_commit("n1", &hash, b"sig", b"pk", 1_700_000_000).unwrap();
        let result = node.submit_commit("n1", &hash, b"sig", b"pk", 1_700_000_000);
        assert!(matches!(result, Err(NodeError::Consensus(qnet_consensus::ConsensusError::DuplicateCommit { .. }))));
    }
}
