//! Postgres-backed journal (Diesel + r2d2), parity with the in-memory
//! backend for `begin_run`/`complete_run`/`last_successful_watermark`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use tracing::warn;

use flux_core::PersistenceError;
use flux_domain::{JournalEntry, JournalStatus, RunIdTriple, RunType};

use crate::journal::Journal;
use crate::schema::journal_entries;

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Abstracts how a pooled connection is obtained, so unit tests can
/// substitute a fake provider without standing up r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

#[derive(Insertable)]
#[diesel(table_name = journal_entries)]
struct NewJournalRow<'a> {
    coordinator_run_id: &'a str,
    flow_run_id: &'a str,
    entity_run_id: &'a str,
    flow_name: &'a str,
    entity_name: Option<&'a str>,
    run_type: &'a str,
    started_at: DateTime<Utc>,
}

#[derive(Queryable)]
struct JournalRow {
    #[diesel(column_name = seq)]
    _seq: i64,
    coordinator_run_id: String,
    flow_run_id: String,
    entity_run_id: String,
    flow_name: String,
    entity_name: Option<String>,
    run_type: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: Option<String>,
    serialized_watermark: Option<String>,
    row_count: i64,
    error: Option<String>,
}

impl JournalRow {
    fn into_entry(self) -> JournalEntry {
        JournalEntry {
            run_ids: RunIdTriple {
                coordinator_run_id: self.coordinator_run_id,
                flow_run_id: self.flow_run_id,
                entity_run_id: self.entity_run_id,
            },
            flow_name: self.flow_name,
            entity_name: self.entity_name,
            run_type: if self.run_type == "full_drop" { RunType::FullDrop } else { RunType::Incremental },
            started_at: self.started_at,
            finished_at: self.finished_at,
            status: self.status.map(|s| match s.as_str() {
                "ok" => JournalStatus::Ok,
                "skipped" => JournalStatus::Skipped,
                _ => JournalStatus::Failed,
            }),
            serialized_watermark: self.serialized_watermark,
            row_count: self.row_count.max(0) as u64,
            error: self.error,
        }
    }
}

fn run_type_str(run_type: RunType) -> &'static str {
    match run_type {
        RunType::FullDrop => "full_drop",
        RunType::Incremental => "incremental",
    }
}

fn status_str(status: JournalStatus) -> &'static str {
    match status {
        JournalStatus::Ok => "ok",
        JournalStatus::Failed => "failed",
        JournalStatus::Skipped => "skipped",
    }
}

/// Small fixed backoff distinct from the pipeline's configurable retry
/// wrapper: 15ms, 30ms, 45ms, three attempts, used only for transient
/// Postgres errors underneath the journal itself.
async fn with_small_backoff<T>(mut op: impl FnMut() -> Result<T, PersistenceError>) -> Result<T, PersistenceError> {
    let delays = [15u64, 30, 45];
    let mut last_err = None;
    for (attempt, delay_ms) in delays.iter().enumerate() {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                warn!(attempt = attempt + 1, "transient journal error, retrying: {e}");
                last_err = Some(e);
                tokio::time::sleep(std::time::Duration::from_millis(*delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| PersistenceError::Unknown("retry loop produced no error".to_string())))
}

pub struct PgJournal<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgJournal<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: ConnectionProvider> Journal for PgJournal<P> {
    async fn begin_run(
        &self,
        run_ids: RunIdTriple,
        flow_name: &str,
        entity_name: Option<String>,
        run_type: RunType,
    ) -> Result<JournalEntry, PersistenceError> {
        let started_at = Utc::now();
        let row_type = run_type_str(run_type);
        with_small_backoff(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(journal_entries::table)
                .values(NewJournalRow {
                    coordinator_run_id: &run_ids.coordinator_run_id,
                    flow_run_id: &run_ids.flow_run_id,
                    entity_run_id: &run_ids.entity_run_id,
                    flow_name,
                    entity_name: entity_name.as_deref(),
                    run_type: row_type,
                    started_at,
                })
                .execute(&mut conn)
                .map_err(classify_diesel_error)
        })
        .await?;
        Ok(JournalEntry::begin(run_ids, flow_name, entity_name, run_type, started_at))
    }

    async fn complete_run(
        &self,
        entry: &JournalEntry,
        status: JournalStatus,
        watermark: Option<String>,
        row_count: u64,
        error: Option<String>,
    ) -> Result<(), PersistenceError> {
        let entity_run_id = entry.run_ids.entity_run_id.clone();
        let status_value = status_str(status);
        with_small_backoff(move || {
            let mut conn = self.provider.connection()?;
            diesel::update(journal_entries::table.filter(journal_entries::entity_run_id.eq(&entity_run_id)))
                .set((
                    journal_entries::finished_at.eq(Utc::now()),
                    journal_entries::status.eq(status_value),
                    journal_entries::serialized_watermark.eq(&watermark),
                    journal_entries::row_count.eq(row_count as i64),
                    journal_entries::error.eq(&error),
                ))
                .execute(&mut conn)
                .map_err(classify_diesel_error)
        })
        .await?;
        Ok(())
    }

    async fn last_successful_watermark(&self, flow_name: &str, entity_name: Option<&str>) -> Result<Option<String>, PersistenceError> {
        let flow_name = flow_name.to_string();
        let entity_name = entity_name.map(|s| s.to_string());
        with_small_backoff(move || {
            let mut conn = self.provider.connection()?;
            let mut query = journal_entries::table
                .filter(journal_entries::flow_name.eq(&flow_name))
                .filter(journal_entries::status.eq("ok"))
                .into_boxed();
            query = match &entity_name {
                Some(name) => query.filter(journal_entries::entity_name.eq(name)),
                None => query.filter(journal_entries::entity_name.is_null()),
            };
            let row = query
                .order(journal_entries::finished_at.desc())
                .select((
                    journal_entries::seq,
                    journal_entries::coordinator_run_id,
                    journal_entries::flow_run_id,
                    journal_entries::entity_run_id,
                    journal_entries::flow_name,
                    journal_entries::entity_name,
                    journal_entries::run_type,
                    journal_entries::started_at,
                    journal_entries::finished_at,
                    journal_entries::status,
                    journal_entries::serialized_watermark,
                    journal_entries::row_count,
                    journal_entries::error,
                ))
                .first::<JournalRow>(&mut conn)
                .optional()
                .map_err(classify_diesel_error)?;
            Ok(row.map(|r| r.into_entry().serialized_watermark).flatten())
        })
        .await
    }
}

fn classify_diesel_error(e: diesel::result::Error) -> PersistenceError {
    use diesel::result::{DatabaseErrorKind, Error};
    match e {
        Error::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            PersistenceError::SerializationConflict(info.message().to_string())
        }
        Error::DatabaseError(_, info) => PersistenceError::Unknown(info.message().to_string()),
        other => PersistenceError::Unknown(other.to_string()),
    }
}
