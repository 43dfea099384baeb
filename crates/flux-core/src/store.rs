//! Sink contract and the shared staging/promotion bookkeeping every
//! Store variant reuses.

use async_trait::async_trait;
use flux_domain::{RecordBatch, RunType, StagedArtifact};

use crate::errors::{ConfigError, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    DirectInsert,
    /// Reserved; must fail fast at flow start, never at first flush.
    TempSwap,
    /// Reserved; must fail fast at flow start, never at first flush.
    Merge,
}

impl WriteStrategy {
    pub fn require_implemented(self) -> Result<(), ConfigError> {
        match self {
            WriteStrategy::DirectInsert => Ok(()),
            WriteStrategy::TempSwap => Err(ConfigError::UnknownWriteStrategy("temp_swap".to_string())),
            WriteStrategy::Merge => Err(ConfigError::UnknownWriteStrategy("merge".to_string())),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Resets `sequence_counter`, `saved_paths`, and any mirror state;
    /// sets full-drop mode from `run_type`.
    async fn configure_for_run(&mut self, run_type: RunType) -> Result<(), ConfigError>;

    /// Runs exactly once before the first batch. The mirror variant
    /// performs the deletion protocol here.
    async fn before_flow_start(&mut self) -> Result<(), SinkError>;

    /// Appends to the store buffer; flushes one artifact whenever
    /// buffered rows reach `batch_size`.
    async fn write(&mut self, batch: RecordBatch) -> Result<(), SinkError>;

    /// Flushes residual buffered rows, promotes all staged artifacts,
    /// and releases driver resources.
    async fn finish(&mut self) -> Result<(), SinkError>;

    /// Idempotent `finish()` + staging cleanup.
    async fn close(&mut self) -> Result<(), SinkError>;

    /// Resets buffer, sequence counter, and saved paths to zero. Invoked
    /// by the retry wrapper's `before_retry` hook around `write`.
    fn reset_retry_sensitive_state(&mut self);
}

/// Bookkeeping shared by every Store variant: which artifacts have been
/// staged but not yet promoted, and whether this run truncates the
/// final location before the first promotion.
#[derive(Debug, Clone, Default)]
pub struct StagingLedger {
    pub saved_paths: Vec<StagedArtifact>,
    pub full_drop_mode: bool,
}

impl StagingLedger {
    pub fn reset(&mut self) {
        self.saved_paths.clear();
        self.full_drop_mode = false;
    }

    pub fn record_staged(&mut self, artifact: StagedArtifact) {
        self.saved_paths.push(artifact);
    }

    /// Promotion order: always `sequence_counter` order, regardless of
    /// the order batches happened to finish writing in.
    pub fn promotion_order(&self) -> Vec<&StagedArtifact> {
        let mut ordered: Vec<&StagedArtifact> = self.saved_paths.iter().collect();
        ordered.sort_by_key(|a| a.sequence);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_order_is_always_sequence_order() {
        let mut ledger = StagingLedger::default();
        ledger.record_staged(StagedArtifact::new("s/b.parquet", "f/b.parquet", 1, 10));
        ledger.record_staged(StagedArtifact::new("s/a.parquet", "f/a.parquet", 0, 10));
        let ordered = ledger.promotion_order();
        assert_eq!(ordered[0].sequence, 0);
        assert_eq!(ordered[1].sequence, 1);
    }

    #[test]
    fn reserved_write_strategies_fail_fast() {
        assert!(WriteStrategy::TempSwap.require_implemented().is_err());
        assert!(WriteStrategy::Merge.require_implemented().is_err());
        assert!(WriteStrategy::DirectInsert.require_implemented().is_ok());
    }
}
