//! Block Pipeline (component F, spec.md §4.F): maintains the mempool
//! view, assembles and signs microblocks from the current round's
//! leader, and seals macroblocks every `microblocks_per_macroblock`
//! microblocks with the window's pool-distribution summary and phase
//! snapshot embedded, per SPEC_FULL §10.5. Owns the `blocks` store handle
//! and is the single writer of the height/hash chain (SPEC_FULL §4.F).

use std::sync::Arc;

use parking_lot::Mutex;
use qnet_consensus::{ReputationEventKind, ReputationRegistry};
use qnet_mempool::Mempool;
use qnet_state::block::{BlockHash, ConsensusData, MacroBlock, MicroBlock, PhaseSnapshot, WindowDistributionSummary};
use qnet_state::StateManager;

use crate::errors::{NodeError, NodeResult};
use crate::events::{EventBus, NodeEvent};
use crate::store::{namespaces, Store};

fn encode_microblock_key(height: u64) -> Vec<u8> {
    format!("micro:{height:020}").into_bytes()
}

fn encode_macroblock_key(height: u64) -> Vec<u8> {
    format!("macro:{height:020}").into_bytes()
}

pub struct BlockPipeline {
    max_microblock_txs: usize,
    microblocks_per_macroblock: u64,
    state: Arc<StateManager>,
    mempool: Arc<Mempool>,
    reputation: Arc<ReputationRegistry>,
    store: Arc<dyn Store>,
    events: EventBus,
    next_height: Mutex<u64>,
    last_hash: Mutex<BlockHash>,
    pending_micro_hashes: Mutex<Vec<BlockHash>>,
}

impl BlockPipeline {
    pub fn new(
        max_microblock_txs: usize,
        microblocks_per_macroblock: u64,
        state: Arc<StateManager>,
        mempool: Arc<Mempool>,
        reputation: Arc<ReputationRegistry>,
        store: Arc<dyn Store>,
        events: EventBus,
    ) -> Self {
        Self {
            max_microblock_txs,
            microblocks_per_macroblock,
            state,
            mempool,
            reputation,
            store,
            events,
            next_height: Mutex::new(1),
            last_hash: Mutex::new([0u8; 32]),
            pending_micro_hashes: Mutex::new(Vec::new()),
        }
    }

    /// No winner, or the winner's proposal didn't arrive by
    /// `microblock_interval + grace`: skip the slot and penalize the
    /// would-be leader via the reputation registry (spec.md §4.F).
    pub fn record_missed_leader(&self, node_id: &str, event_id: &str, now: u64) {
        tracing::warn!(node_id, "leader missed its microblock slot, skipping");
        match self.reputation.apply_event(node_id, event_id, ReputationEventKind::MissedPing, now) {
            Ok((_, Some(request))) => self.events.publish(NodeEvent::BanRequested(request)),
            Ok((_, None)) => {}
            Err(err) => tracing::warn!(node_id, %err, "missed-leader penalty dropped: node unknown to reputation registry"),
        }
    }

    /// Assemble, validate, and apply a microblock for `producer`, draining
    /// up to `max_microblock_txs` from the mempool by priority. Microblock
    /// heights are strictly monotonic (spec.md §5).
    pub fn produce_microblock(&self, producer: String, now: u64) -> NodeResult<MicroBlock> {
        let transactions = self.mempool.get_microblock_transactions(self.max_microblock_txs);
        let height = *self.next_height.lock();
        let previous_hash = *self.last_hash.lock();

        let block = MicroBlock::new(height, now, previous_hash, transactions, producer);
        block.validate().map_err(NodeError::State)?;
        self.state.apply_microblock(&block).map_err(NodeError::State)?;

        let tx_hashes: Vec<_> = block.transactions.iter().map(|tx| tx.hash.clone()).collect();
        self.mempool.confirm_transactions(&tx_hashes);

        let hash = block.hash();
        self.store.put(namespaces::BLOCKS, &encode_microblock_key(height), &encode_json(&block));

        *self.next_height.lock() = height + 1;
        *self.last_hash.lock() = hash;
        self.pending_micro_hashes.lock().push(hash);

        self.events.publish(NodeEvent::MicroblockProduced { height, tx_count: block.transactions.len() });
        tracing::info!(height, tx_count = block.transactions.len(), "microblock produced");
        Ok(block)
    }

    /// Seal a macroblock once `microblocks_per_macroblock` microblocks have
    /// accumulated since the last seal. Embeds the window's distribution
    /// summary and phase snapshot so the macroblock is independently
    /// verifiable (SPEC_FULL §10.5). Returns `None` if the window isn't
    /// full yet.
    pub fn try_seal_macroblock(
        &self,
        height: u64,
        now: u64,
        consensus_data: ConsensusData,
        distribution: Option<WindowDistributionSummary>,
        phase_snapshot: PhaseSnapshot,
    ) -> NodeResult<Option<MacroBlock>> {
        let mut pending = self.pending_micro_hashes.lock();
        if (pending.len() as u64) < self.microblocks_per_macroblock {
            return Ok(None);
        }
        let micro_hashes = std::mem::take(&mut *pending);
        drop(pending);

        let state_root = self.state.calculate_state_root().map_err(NodeError::State)?;
        let previous_hash = self.state.get_state_root();
        let block = MacroBlock::new(height, now, previous_hash, micro_hashes.clone(), state_root, consensus_data, distribution, phase_snapshot);
        block.validate().map_err(NodeError::State)?;

        self.store.put(namespaces::BLOCKS, &encode_macroblock_key(height), &encode_json(&block));
        self.events.publish(NodeEvent::MacroblockSealed { height, micro_count: micro_hashes.len() });
        tracing::info!(height, micro_count = micro_hashes.len(), "macroblock sealed");
        Ok(Some(block))
    }

    pub fn current_height(&self) -> u64 {
        *self.next_height.lock() - 1
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_consensus::ReputationConfig;
    use qnet_mempool::MempoolConfig;
    use qnet_state::account::Account;
    use qnet_state::transaction::{gas_limits, Transaction, TransactionType};
    use crate::store::InMemoryStore;

    fn pipeline() -> BlockPipeline {
        let state = Arc::new(StateManager::new());
        state.update_account("alice".into(), Account::with_balance("alice".into(), 10_000_000));
        let mempool = Arc::new(Mempool::new(MempoolConfig::default(), state.clone()));
        let reputation = Arc::new(ReputationRegistry::new(ReputationConfig::default()));
        let store = InMemoryStore::new();
        let (events, _sub) = EventBus::new();
        BlockPipeline::new(50_000, 90, state, mempool, reputation, store, events)
    }

    fn tx(nonce: u64) -> Transaction {
        Transaction::new(
            "alice".into(),
            Some("bob".into()),
            10,
            nonce,
            5,
            gas_limits::TRANSFER,
            1_700_000_000,
            None,
            TransactionType::Transfer { from: "alice".into(), to: "bob".into(), amount: 10 },
        )
    }

    #[test]
    fn microblock_heights_are_strictly_monotonic() {
        let pipeline = pipeline();
        pipeline.mempool.add_transaction(tx(0)).unwrap();
        let first = pipeline.produce_microblock("leader1".into(), 1_700_000_000).unwrap();
        pipeline.mempool.add_transaction(tx(1)).unwrap();
        let second = pipeline.produce_microblock("leader1".into(), 1_700_000_001).unwrap();
        assert_eq!(first.height, 1);
        assert_eq!(second.height, 2);
        assert_eq!(second.previous_hash, first.hash());
    }

    #[test]
    fn macroblock_not_sealed_before_window_fills() {
        let pipeline = pipeline();
        pipeline.produce_microblock("leader1".into(), 1_700_000_000).unwrap();
        let snapshot = PhaseSnapshot { phase: 1, burn_percent: 0.0, network_age_years: 0.0, total_activations: 0 };
        let consensus_data = ConsensusData { commits: Default::default(), reveals: Default::default(), next_leader: "leader1".into() };
        let sealed = pipeline.try_seal_macroblock(1, 1_700_000_090, consensus_data, None, snapshot).unwrap();
        assert!(sealed.is_none());
    }
}
