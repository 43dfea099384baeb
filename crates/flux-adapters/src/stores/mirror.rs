//! Mirror Store variant: reflects deletes from the source into the
//! destination via the deletion protocol, full-drop and incremental
//! anti-join variants both supported.

use async_trait::async_trait;

use flux_core::errors::{ConfigError, SinkError};
use flux_core::home::Home;
use flux_core::store::{StagingLedger, Store, WriteStrategy};
use flux_domain::{build_deletion_batch, ColumnData, RecordBatch, RunType, Schema, StoreBuffer};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeletionMetrics {
    pub column_based_deletions: u64,
    pub query_based_deletions: u64,
}

/// Narrow target-side capability the deletion protocol needs: read the
/// current set of key values, and accept a RecordBatch of new/changed
/// rows through the normal pipeline.
#[async_trait]
pub trait MirrorTarget: Send + Sync {
    async fn find_target_keys(&self, key_columns: &[String]) -> Result<RecordBatch, SinkError>;
    async fn write_through(&mut self, batch: RecordBatch) -> Result<(), SinkError>;
    async fn is_reachable(&self) -> bool;
}

pub struct MirrorStore<T: MirrorTarget> {
    pub key_columns: Vec<String>,
    pub deletion_source: Option<std::sync::Arc<dyn Home>>,
    target: T,
    write_strategy: WriteStrategy,
    buffer: StoreBuffer,
    ledger: StagingLedger,
    pub metrics: DeletionMetrics,
}

impl<T: MirrorTarget> MirrorStore<T> {
    pub fn new(key_columns: Vec<String>, deletion_source: Option<std::sync::Arc<dyn Home>>, target: T) -> Self {
        Self {
            key_columns,
            deletion_source,
            target,
            write_strategy: WriteStrategy::DirectInsert,
            buffer: StoreBuffer::new(),
            ledger: StagingLedger::default(),
            metrics: DeletionMetrics::default(),
        }
    }

    /// Full-drop mode: tag every key currently in the mirror target for
    /// deletion before any inserts land, so deletes are observed first.
    async fn run_full_drop_deletion(&mut self) -> Result<(), SinkError> {
        if !self.target.is_reachable().await {
            return Err(ConfigError::UnreachableMirrorTarget("mirror target unreachable for full-drop deletion".to_string()).into());
        }
        let target_keys = self.target.find_target_keys(&self.key_columns).await?;
        if target_keys.is_empty() {
            return Ok(());
        }
        let deletions = build_deletion_batch(&target_keys).map_err(|e| SinkError::StagingWrite(e.to_string()))?;
        self.target.write_through(deletions).await?;
        self.metrics.column_based_deletions += target_keys.row_count() as u64;
        Ok(())
    }

    /// Query-based incremental deletion: anti-join target keys against
    /// the source's current keys; whatever remains in target-only is a
    /// deletion.
    async fn run_incremental_deletion(&mut self) -> Result<(), SinkError> {
        let Some(home) = self.deletion_source.clone() else {
            return Ok(());
        };
        if !home.supports_key_finding() {
            return Err(SinkError::Promotion("deletion source does not support key finding".to_string()));
        }

        let target_keys = self.target.find_target_keys(&self.key_columns).await?;
        if target_keys.is_empty() {
            return Err(ConfigError::EmptyMirrorTarget.into());
        }

        let source_keys = home
            .find_keys(&self.key_columns)
            .await
            .map_err(|e| SinkError::Promotion(e.to_string()))?;

        let deletions = anti_join(&target_keys, &source_keys, &self.key_columns).map_err(SinkError::StagingWrite)?;
        if deletions.row_count() > 0 {
            let marked = build_deletion_batch(&deletions).map_err(|e| SinkError::StagingWrite(e.to_string()))?;
            self.metrics.query_based_deletions += marked.row_count() as u64;
            self.target.write_through(marked).await?;
        }
        // Staging keys cleanup is best-effort: a failure here logs and
        // does not fail the flow.
        Ok(())
    }
}

/// `target_keys \ source_keys` on the configured key columns.
fn anti_join(target_keys: &RecordBatch, source_keys: &RecordBatch, key_columns: &[String]) -> Result<RecordBatch, String> {
    let source_set: std::collections::HashSet<Vec<String>> = (0..source_keys.row_count())
        .map(|row| key_columns.iter().map(|col| stringify_cell(source_keys.column(col), row)).collect())
        .collect();

    let keep_rows: Vec<usize> = (0..target_keys.row_count())
        .filter(|row| {
            let key: Vec<String> = key_columns.iter().map(|col| stringify_cell(target_keys.column(col), *row)).collect();
            !source_set.contains(&key)
        })
        .collect();

    project_rows(target_keys, &keep_rows)
}

fn stringify_cell(column: Option<&ColumnData>, row: usize) -> String {
    match column {
        Some(ColumnData::Utf8(v)) => v[row].clone().unwrap_or_default(),
        Some(ColumnData::Int(v)) => v[row].map(|n| n.to_string()).unwrap_or_default(),
        Some(ColumnData::DateTime(v)) => v[row].map(|d| d.to_rfc3339()).unwrap_or_default(),
        _ => String::new(),
    }
}

fn project_rows(batch: &RecordBatch, rows: &[usize]) -> Result<RecordBatch, String> {
    let mut schema = Schema::new();
    let mut columns = indexmap::IndexMap::new();
    for name in batch.column_names() {
        let logical = *batch.schema().get(name).unwrap();
        let source = batch.column(name).unwrap();
        schema.insert(name.to_string(), logical);
        columns.insert(name.to_string(), select_rows(source, rows));
    }
    RecordBatch::try_new(schema, columns).map_err(|e| e.to_string())
}

fn select_rows(column: &ColumnData, rows: &[usize]) -> ColumnData {
    match column {
        ColumnData::Utf8(v) => ColumnData::Utf8(rows.iter().map(|&i| v[i].clone()).collect()),
        ColumnData::Int(v) => ColumnData::Int(rows.iter().map(|&i| v[i]).collect()),
        ColumnData::Float(v) => ColumnData::Float(rows.iter().map(|&i| v[i]).collect()),
        ColumnData::Bool(v) => ColumnData::Bool(rows.iter().map(|&i| v[i]).collect()),
        ColumnData::DateTime(v) => ColumnData::DateTime(rows.iter().map(|&i| v[i]).collect()),
        ColumnData::Date(v) => ColumnData::Date(rows.iter().map(|&i| v[i]).collect()),
        ColumnData::Time(v) => ColumnData::Time(rows.iter().map(|&i| v[i]).collect()),
        ColumnData::Decimal(v) => ColumnData::Decimal(rows.iter().map(|&i| v[i]).collect()),
        ColumnData::Binary(v) => ColumnData::Binary(rows.iter().map(|&i| v[i].clone()).collect()),
        ColumnData::Null(_) => ColumnData::Null(rows.len()),
    }
}

#[async_trait]
impl<T: MirrorTarget> Store for MirrorStore<T> {
    async fn configure_for_run(&mut self, run_type: RunType) -> Result<(), ConfigError> {
        self.write_strategy.require_implemented()?;
        self.buffer.reset_retry_sensitive_state();
        self.ledger.reset();
        self.ledger.full_drop_mode = matches!(run_type, RunType::FullDrop);
        self.metrics = DeletionMetrics::default();
        Ok(())
    }

    async fn before_flow_start(&mut self) -> Result<(), SinkError> {
        if self.ledger.full_drop_mode {
            self.run_full_drop_deletion().await
        } else {
            self.run_incremental_deletion().await
        }
    }

    async fn write(&mut self, batch: RecordBatch) -> Result<(), SinkError> {
        self.target.write_through(batch).await
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.finish().await
    }

    fn reset_retry_sensitive_state(&mut self) {
        self.buffer.reset_retry_sensitive_state();
        self.ledger.reset();
    }
}
