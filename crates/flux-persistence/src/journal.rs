//! Journal contract: append-only run history plus last-successful-
//! watermark lookups for incremental resumption.

use async_trait::async_trait;
use flux_domain::{JournalEntry, JournalStatus, RunIdTriple};

use flux_core::PersistenceError;

#[async_trait]
pub trait Journal: Send + Sync {
    async fn begin_run(
        &self,
        run_ids: RunIdTriple,
        flow_name: &str,
        entity_name: Option<String>,
        run_type: flux_domain::RunType,
    ) -> Result<JournalEntry, PersistenceError>;

    async fn complete_run(
        &self,
        entry: &JournalEntry,
        status: JournalStatus,
        watermark: Option<String>,
        row_count: u64,
        error: Option<String>,
    ) -> Result<(), PersistenceError>;

    async fn last_successful_watermark(&self, flow_name: &str, entity_name: Option<&str>) -> Result<Option<String>, PersistenceError>;
}
