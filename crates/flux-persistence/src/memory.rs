//! In-memory journal, used for tests and the local-only demo path.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use flux_domain::{JournalEntry, JournalStatus, RunIdTriple, RunType};

use flux_core::PersistenceError;

use crate::journal::Journal;

#[derive(Default)]
pub struct InMemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn begin_run(
        &self,
        run_ids: RunIdTriple,
        flow_name: &str,
        entity_name: Option<String>,
        run_type: RunType,
    ) -> Result<JournalEntry, PersistenceError> {
        let entry = JournalEntry::begin(run_ids, flow_name, entity_name, run_type, Utc::now());
        self.entries.lock().await.push(entry.clone());
        Ok(entry)
    }

    async fn complete_run(
        &self,
        entry: &JournalEntry,
        status: JournalStatus,
        watermark: Option<String>,
        row_count: u64,
        error: Option<String>,
    ) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().await;
        let target = entries
            .iter_mut()
            .find(|e| e.run_ids.entity_run_id == entry.run_ids.entity_run_id)
            .ok_or_else(|| PersistenceError::Unknown("journal entry not found for completion".to_string()))?;
        target.finished_at = Some(Utc::now());
        target.status = Some(status);
        target.serialized_watermark = watermark;
        target.row_count = row_count;
        target.error = error;
        Ok(())
    }

    async fn last_successful_watermark(&self, flow_name: &str, entity_name: Option<&str>) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.lock().await;
        let watermark = entries
            .iter()
            .filter(|e| e.is_complete() && matches!(e.status, Some(JournalStatus::Ok)))
            .filter(|e| e.flow_name == flow_name && e.entity_name.as_deref() == entity_name)
            .max_by_key(|e| e.finished_at)
            .and_then(|e| e.serialized_watermark.clone());
        Ok(watermark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_domain::generate_run_id_triple;

    fn triple() -> RunIdTriple {
        let (c, f, e) = generate_run_id_triple("coord", "flow", "entity", "2026-01-01T00:00:00Z");
        RunIdTriple { coordinator_run_id: c, flow_run_id: f, entity_run_id: e }
    }

    #[tokio::test]
    async fn partial_writes_are_not_visible_until_complete() {
        let journal = InMemoryJournal::new();
        let entry = journal.begin_run(triple(), "flow", Some("entity".into()), RunType::Incremental).await.unwrap();
        assert!(journal.last_successful_watermark("flow", Some("entity")).await.unwrap().is_none());

        journal.complete_run(&entry, JournalStatus::Ok, Some("42".into()), 100, None).await.unwrap();
        assert_eq!(journal.last_successful_watermark("flow", Some("entity")).await.unwrap(), Some("42".to_string()));
    }

    #[tokio::test]
    async fn failed_runs_do_not_advance_watermark() {
        let journal = InMemoryJournal::new();
        let entry = journal.begin_run(triple(), "flow", Some("entity".into()), RunType::Incremental).await.unwrap();
        journal.complete_run(&entry, JournalStatus::Failed, None, 0, Some("boom".into())).await.unwrap();
        assert!(journal.last_successful_watermark("flow", Some("entity")).await.unwrap().is_none());
    }
}
