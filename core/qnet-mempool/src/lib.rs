//! Transaction mempool: the validated-tx holding area the block pipeline
//! drains to assemble microblocks.

pub mod config;
pub mod errors;
pub mod eviction;
pub mod mempool;
pub mod priority;
pub mod validation;

pub use config::MempoolConfig;
pub use errors::{MempoolError, MempoolResult};
pub use mempool::{Mempool, MempoolStats};
pub use priority::TxPriority;
pub use validation::{DefaultValidator, SimpleValidator, TxValidator};

pub mod prelude {
    pub use crate::{
        config::*, errors::*, eviction::*, mempool::*, priority::*, validation::*,
    };
}
