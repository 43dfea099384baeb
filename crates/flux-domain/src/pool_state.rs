//! Shared vocabulary for connection pool handle state.
//!
//! The pool implementation itself lives in `flux-core`; this crate only
//! owns the data shape so both `flux-core` and `flux-adapters` can speak
//! about handle status without a circular dependency.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleStatus {
    Idle,
    InUse,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    pub idle: usize,
    pub in_use: usize,
    pub broken: usize,
    pub pool_size: usize,
}

impl PoolCounts {
    pub fn invariant_holds(&self) -> bool {
        self.idle + self.in_use + self.broken <= self.pool_size
    }
}
