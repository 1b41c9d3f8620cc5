//! Configuration for the mempool.

use serde::{Deserialize, Serialize};

/// Mempool configuration. Values are the spec's configured bounds on
/// submissions and capacity (§5 backpressure, §6 configuration keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolConfig {
    /// Maximum number of transactions held at once.
    pub max_size: usize,

    /// Maximum transactions per sender, to bound spam from a single account.
    pub max_per_sender: usize,

    /// Transaction time-to-live before it is evicted unconfirmed.
    pub tx_ttl_seconds: u64,

    /// Minimum gas price accepted.
    pub min_gas_price: u64,

    /// Maximum gas limit accepted on any single transaction.
    pub max_gas_limit: u64,

    /// How often the periodic eviction sweep runs.
    pub eviction_interval_seconds: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: 500_000,
            max_per_sender: 1_000,
            tx_ttl_seconds: 1_800,
            min_gas_price: 1,
            max_gas_limit: 1_000_000,
            eviction_interval_seconds: 30,
        }
    }
}
