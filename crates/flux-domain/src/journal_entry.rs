//! Append-only journal record for one flow run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalStatus {
    Ok,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdTriple {
    pub coordinator_run_id: String,
    pub flow_run_id: String,
    pub entity_run_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub run_ids: RunIdTriple,
    pub flow_name: String,
    pub entity_name: Option<String>,
    pub run_type: crate::flow_config::RunType,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<JournalStatus>,
    pub serialized_watermark: Option<String>,
    pub row_count: u64,
    pub error: Option<String>,
}

impl JournalEntry {
    pub fn begin(
        run_ids: RunIdTriple,
        flow_name: impl Into<String>,
        entity_name: Option<String>,
        run_type: crate::flow_config::RunType,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_ids,
            flow_name: flow_name.into(),
            entity_name,
            run_type,
            started_at,
            finished_at: None,
            status: None,
            serialized_watermark: None,
            row_count: 0,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.finished_at.is_some() && self.status.is_some()
    }
}
