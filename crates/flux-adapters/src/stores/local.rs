//! Local-file Store implementing the staging/promotion protocol: flush
//! to a `_tmp` staging path, verify, and promote to final on `finish()`.

use std::sync::Arc;

use async_trait::async_trait;

use flux_core::errors::{ConfigError, SinkError};
use flux_core::path::{build_final_path, build_staging_path};
use flux_core::store::{StagingLedger, Store, WriteStrategy};
use flux_core::{Codec, Format};
use flux_domain::{RecordBatch, RunType, StagedArtifact, StoreBuffer};

pub struct LocalStore<C: Codec> {
    pub final_path_pattern: String,
    pub entity_name: Option<String>,
    pub format: Format,
    pub batch_size: usize,
    pub file_pattern: String,
    pub write_strategy: WriteStrategy,
    pub codec: Arc<C>,

    buffer: StoreBuffer,
    ledger: StagingLedger,
}

impl<C: Codec> LocalStore<C> {
    pub fn new(
        final_path_pattern: impl Into<String>,
        entity_name: Option<String>,
        format: Format,
        batch_size: usize,
        file_pattern: impl Into<String>,
        write_strategy: WriteStrategy,
        codec: Arc<C>,
    ) -> Self {
        Self {
            final_path_pattern: final_path_pattern.into(),
            entity_name,
            format,
            batch_size,
            file_pattern: file_pattern.into(),
            write_strategy,
            codec,
            buffer: StoreBuffer::new(),
            ledger: StagingLedger::default(),
        }
    }

    fn final_dir(&self) -> String {
        build_final_path(&self.final_path_pattern, self.entity_name.as_deref())
    }

    fn staging_dir(&self) -> String {
        build_staging_path(&self.final_path_pattern, self.entity_name.as_deref())
    }

    fn filename_for(&self, sequence: u64) -> String {
        let sequence_str = format!("{sequence:020}");
        self.file_pattern
            .replace("{sequence:020d}", &sequence_str)
            .replace("{name}", self.entity_name.as_deref().unwrap_or("data"))
            + "."
            + self.format.suffix().trim_start_matches('.')
    }

    /// Scans the final directory for the maximum existing sequence
    /// number and resumes the buffer's counter from `max + 1`.
    pub fn reconcile_sequence_counter(&mut self) -> std::io::Result<()> {
        let final_dir = self.final_dir();
        let max_sequence = match std::fs::read_dir(&final_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .filter_map(|name| name.split('_').find(|part| part.chars().all(|c| c.is_ascii_digit()) && part.len() == 20).map(str::to_string))
                .filter_map(|digits| digits.parse::<u64>().ok())
                .max(),
            Err(_) => None,
        };
        self.buffer = match max_sequence {
            Some(max) => StoreBuffer::resume_from(max + 1),
            None => StoreBuffer::new(),
        };
        Ok(())
    }

    async fn flush_one(&mut self, sequence: u64, batch: RecordBatch) -> Result<(), SinkError> {
        let staging_path = format!("{}/{}", self.staging_dir(), self.filename_for(sequence));
        self.codec.write(&batch, &staging_path, self.format).await?;

        if !tokio::fs::try_exists(&staging_path).await.unwrap_or(false) {
            return Err(SinkError::StagingWrite(format!("artifact missing after write: {staging_path}")));
        }

        let final_path = format!("{}/{}", self.final_dir(), self.filename_for(sequence));
        self.ledger.record_staged(StagedArtifact::new(staging_path, final_path, sequence, batch.row_count() as u64));
        Ok(())
    }

    async fn promote_one(&self, artifact: &StagedArtifact) -> Result<(), SinkError> {
        if let Some(parent) = std::path::Path::new(&artifact.final_path).parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| SinkError::Promotion(e.to_string()))?;
        }
        tokio::fs::rename(&artifact.staging_path, &artifact.final_path)
            .await
            .map_err(|e| SinkError::Promotion(format!("{}: {e}", artifact.staging_path)))
    }
}

#[async_trait]
impl<C: Codec> Store for LocalStore<C> {
    async fn configure_for_run(&mut self, run_type: RunType) -> Result<(), ConfigError> {
        self.write_strategy.require_implemented()?;
        self.buffer.reset_retry_sensitive_state();
        self.ledger.reset();
        self.ledger.full_drop_mode = matches!(run_type, RunType::FullDrop);
        Ok(())
    }

    async fn before_flow_start(&mut self) -> Result<(), SinkError> {
        if self.ledger.full_drop_mode {
            let final_dir = self.final_dir();
            if tokio::fs::try_exists(&final_dir).await.unwrap_or(false) {
                tokio::fs::remove_dir_all(&final_dir).await.map_err(|e| SinkError::Promotion(e.to_string()))?;
            }
        }
        self.reconcile_sequence_counter().map_err(|e| SinkError::StagingWrite(e.to_string()))?;
        Ok(())
    }

    async fn write(&mut self, batch: RecordBatch) -> Result<(), SinkError> {
        self.buffer.push(batch).map_err(|e| SinkError::StagingWrite(e.to_string()))?;
        while let Some((sequence, batch)) = self.buffer.take_full(self.batch_size) {
            self.flush_one(sequence, batch).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        if let Some((sequence, batch)) = self.buffer.take_residual() {
            self.flush_one(sequence, batch).await?;
        }

        let ordered: Vec<StagedArtifact> = self.ledger.promotion_order().into_iter().cloned().collect();
        let mut unpromoted = Vec::new();
        for artifact in &ordered {
            if self.promote_one(artifact).await.is_err() {
                unpromoted.push(artifact.staging_path.clone());
            }
        }
        if !unpromoted.is_empty() {
            return Err(SinkError::PartialPromotion(unpromoted.len(), unpromoted));
        }
        self.ledger.saved_paths.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.finish().await?;
        let staging_dir = self.staging_dir();
        let _ = tokio::fs::remove_dir_all(&staging_dir).await;
        Ok(())
    }

    fn reset_retry_sensitive_state(&mut self) {
        self.buffer.reset_retry_sensitive_state();
        self.ledger.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NdjsonCodec;
    use flux_domain::{ColumnData, LogicalType, Schema};
    use indexmap::IndexMap;

    fn batch(ids: Vec<i64>) -> RecordBatch {
        let mut schema = Schema::new();
        schema.insert("id".to_string(), LogicalType::Int);
        let mut columns = IndexMap::new();
        columns.insert("id".to_string(), ColumnData::Int(ids.into_iter().map(Some).collect()));
        RecordBatch::try_new(schema, columns).unwrap()
    }

    #[tokio::test]
    async fn flushes_in_batch_size_chunks_and_promotes_in_sequence_order() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = format!("{}/customers", dir.path().display());
        let mut store = LocalStore::new(
            final_path.clone(),
            Some("customers".to_string()),
            Format::Ndjson,
            3,
            "test_{sequence:020d}".to_string(),
            WriteStrategy::DirectInsert,
            Arc::new(NdjsonCodec),
        );

        store.configure_for_run(RunType::FullDrop).await.unwrap();
        store.before_flow_start().await.unwrap();

        store.write(batch(vec![1, 2, 3, 4, 5])).await.unwrap();
        store.write(batch(vec![6, 7])).await.unwrap();
        store.finish().await.unwrap();

        let mut final_files: Vec<_> = std::fs::read_dir(&final_path).unwrap().filter_map(|e| e.ok()).map(|e| e.file_name().to_string_lossy().to_string()).collect();
        final_files.sort();
        assert_eq!(final_files.len(), 3);
        assert!(!std::path::Path::new(&format!("{}/_tmp", final_path)).exists() || std::fs::read_dir(format!("{}/_tmp", final_path)).map(|mut d| d.next().is_none()).unwrap_or(true));
    }

    #[tokio::test]
    async fn reconciles_sequence_counter_from_existing_final_files() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = format!("{}/customers", dir.path().display());
        std::fs::create_dir_all(&final_path).unwrap();
        std::fs::write(format!("{final_path}/test_00000000000000000003.ndjson"), "").unwrap();

        let mut store = LocalStore::new(
            final_path,
            Some("customers".to_string()),
            Format::Ndjson,
            3,
            "test_{sequence:020d}".to_string(),
            WriteStrategy::DirectInsert,
            Arc::new(NdjsonCodec),
        );
        store.reconcile_sequence_counter().unwrap();
        assert_eq!(store.buffer.sequence_counter(), 4);
    }
}
