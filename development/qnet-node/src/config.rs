//! Node configuration: every key enumerated in spec.md §6, loaded from a
//! TOML/JSON file the host provides. Unknown keys are rejected outright —
//! this is the "untyped configs -> tagged structs" redesign the teacher's
//! own scattered `std::env::var` reads never had.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BlockPipelineConfig {
    pub microblock_interval_seconds: u64,
    pub macroblock_interval_seconds: u64,
    pub microblocks_per_macroblock: u64,
    pub max_microblock_txs: usize,
    /// Grace period after `microblock_interval_seconds` before a slot with
    /// no leader proposal is recorded as missed (spec.md §4.F).
    pub leader_grace_seconds: u64,
}

impl Default for BlockPipelineConfig {
    fn default() -> Self {
        Self {
            microblock_interval_seconds: 1,
            macroblock_interval_seconds: 90,
            microblocks_per_macroblock: 90,
            max_microblock_txs: 50_000,
            leader_grace_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConsensusTimingConfig {
    pub commit_window_seconds: u64,
    pub reveal_window_seconds: u64,
    pub min_reveals_ratio: f64,
    pub min_participants: usize,
    pub max_round_time_seconds: u64,
    pub target_round_time_seconds: u64,
    pub difficulty_adjustment_window: u64,
}

impl Default for ConsensusTimingConfig {
    fn default() -> Self {
        Self {
            commit_window_seconds: 60,
            reveal_window_seconds: 30,
            min_reveals_ratio: 0.67,
            min_participants: 3,
            max_round_time_seconds: 120,
            target_round_time_seconds: 60,
            difficulty_adjustment_window: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RewardPoolConfig {
    pub reward_window_seconds: u64,
    pub ping_slots: u64,
    pub ping_slot_duration_seconds: u64,
    pub ping_grace_seconds: u64,
    pub min_reputation_light: f64,
    pub min_reputation_full_super: f64,
    pub inactive_threshold_seconds: u64,
    pub quarantine_duration_seconds: u64,
    pub max_free_restorations: u32,
    pub restore_window_seconds: u64,
    pub reactivation_required_after_seconds: u64,
}

impl Default for RewardPoolConfig {
    fn default() -> Self {
        Self {
            reward_window_seconds: 14_400,
            ping_slots: 240,
            ping_slot_duration_seconds: 60,
            ping_grace_seconds: 30,
            min_reputation_light: 0.0,
            min_reputation_full_super: 70.0,
            inactive_threshold_seconds: 604_800,
            quarantine_duration_seconds: 604_800,
            max_free_restorations: 10,
            restore_window_seconds: 2_592_000,
            reactivation_required_after_seconds: 31_536_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Phase2Prices {
    pub light: u64,
    pub full: u64,
    pub super_node: u64,
}

impl Default for Phase2Prices {
    fn default() -> Self {
        Self { light: 5_000, full: 7_500, super_node: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PhaseEconomyConfig {
    pub phase1_launch_unix: u64,
    pub phase1_total_supply: u64,
    pub phase1_burn_threshold_ratio: f64,
    pub phase1_max_years: f64,
    pub phase1_base_price: u64,
    pub phase1_step: u64,
    pub phase1_floor: u64,
    pub phase2_base_prices: Phase2Prices,
}

impl Default for PhaseEconomyConfig {
    fn default() -> Self {
        Self {
            phase1_launch_unix: 0,
            phase1_total_supply: 1_000_000_000,
            phase1_burn_threshold_ratio: 0.9,
            phase1_max_years: 5.0,
            phase1_base_price: 1_500,
            phase1_step: 150,
            phase1_floor: 150,
            phase2_base_prices: Phase2Prices::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ShardingConfig {
    pub total_shards: u32,
    pub managed_shards: Vec<u32>,
    pub max_cross_shard_txs: usize,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            total_shards: 16,
            managed_shards: vec![0],
            max_cross_shard_txs: 1_000,
        }
    }
}

/// Security Envelope configuration (spec.md §4.G): loaded through this
/// layer rather than hardcoded, per SPEC_FULL §4.G.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EnvelopeConfig {
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub blacklist_backoff_cap_seconds: u64,
    pub nonce_ttl_seconds: u64,
    pub session_ttl_seconds: u64,
    pub max_payload_bytes: usize,
    pub tls_required: bool,
    pub hardening_audit_mode: bool,
    pub ip_allow_list: Vec<String>,
    pub ip_deny_list: Vec<String>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_second: 50,
            rate_limit_burst: 200,
            blacklist_backoff_cap_seconds: 24 * 60 * 60,
            nonce_ttl_seconds: 300,
            session_ttl_seconds: 24 * 60 * 60,
            max_payload_bytes: 1024 * 1024,
            tls_required: true,
            hardening_audit_mode: true,
            ip_allow_list: vec![],
            ip_deny_list: vec![],
        }
    }
}

/// Top-level node configuration: every key spec.md §6 enumerates, grouped
/// by the component it configures. Deserialized once at startup; nothing
/// downstream reads environment variables directly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct NodeConfig {
    pub pipeline: BlockPipelineConfig,
    pub consensus: ConsensusTimingConfig,
    pub rewards: RewardPoolConfig,
    pub phase: PhaseEconomyConfig,
    pub sharding: ShardingConfig,
    pub envelope: EnvelopeConfig,
}

impl NodeConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
