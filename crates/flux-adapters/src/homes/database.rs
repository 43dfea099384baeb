//! Database Home: reads a table or query through a pooled driver
//! connection, offloading the blocking driver call to the runtime's
//! blocking pool via the connection pool's own `spawn_blocking` usage.

use std::sync::Arc;

use async_trait::async_trait;

use flux_core::errors::{ConfigError, SourceError};
use flux_core::home::{escape_string_literal, is_safe_identifier, BatchSink, Home};
use flux_core::pool::{HandleFactory, Pool};
use flux_core::Driver;
use flux_domain::RecordBatch;

/// `{entity}` substitution applies to both `table` and a custom `query`.
pub struct DatabaseHome<D: Driver> {
    pub table_or_query: String,
    pub is_custom_query: bool,
    pub entity_name: Option<String>,
    pub watermark_column: Option<String>,
    pub allow_unsafe_watermark_fallback: bool,
    pub key_columns: Vec<String>,
    pool: Arc<Pool<DriverFactory<D>>>,
    driver: Arc<D>,
}

pub struct DriverFactory<D: Driver> {
    pub driver: Arc<D>,
}

#[async_trait]
impl<D: Driver> HandleFactory for DriverFactory<D> {
    type Handle = D::Handle;

    async fn open(&self) -> Result<Self::Handle, flux_core::errors::PoolError> {
        self.driver.open_handle().await
    }

    async fn close(&self, handle: Self::Handle) {
        self.driver.close_handle(handle).await
    }

    async fn is_alive(&self, handle: &Self::Handle) -> bool {
        self.driver.is_handle_alive(handle).await
    }
}

impl<D: Driver> DatabaseHome<D> {
    pub fn new(
        table_or_query: impl Into<String>,
        is_custom_query: bool,
        entity_name: Option<String>,
        watermark_column: Option<String>,
        allow_unsafe_watermark_fallback: bool,
        key_columns: Vec<String>,
        pool: Arc<Pool<DriverFactory<D>>>,
        driver: Arc<D>,
    ) -> Self {
        Self {
            table_or_query: table_or_query.into(),
            is_custom_query,
            entity_name,
            watermark_column,
            allow_unsafe_watermark_fallback,
            key_columns,
            pool,
            driver,
        }
    }

    fn resolved_query(&self) -> String {
        match &self.entity_name {
            Some(entity) => self.table_or_query.replace("{entity}", entity),
            None => self.table_or_query.clone(),
        }
    }
}

#[async_trait]
impl<D: Driver + 'static> Home for DatabaseHome<D> {
    async fn read(&self, sink: &mut dyn BatchSink) -> Result<(), SourceError> {
        let mut guard = self.pool.acquire().await.map_err(|e| SourceError::Io(e.to_string()))?;
        let sql = if self.is_custom_query { self.resolved_query() } else { format!("SELECT * FROM {}", self.resolved_query()) };
        self.driver.query_rows(guard.handle_mut(), &sql, sink).await
    }

    async fn read_with_watermark(&self, serialized_watermark: &str, sink: &mut dyn BatchSink) -> Result<(), SourceError> {
        if self.is_custom_query {
            tracing::warn!("custom query home cannot safely rewrite SQL; falling back to full read()");
            return self.read(sink).await;
        }
        let Some(column) = &self.watermark_column else {
            return self.read(sink).await;
        };
        if !is_safe_identifier(column) {
            if !self.allow_unsafe_watermark_fallback {
                return Err(ConfigError::UnsafeIdentifier(column.clone()).into());
            }
            tracing::warn!(column = %column, "rejecting unsafe watermark column name; falling back to full read()");
            return self.read(sink).await;
        }
        let mut guard = self.pool.acquire().await.map_err(|e| SourceError::Io(e.to_string()))?;
        let sql = format!(
            "SELECT * FROM {} WHERE {column} > {}",
            self.resolved_query(),
            escape_string_literal(serialized_watermark)
        );
        self.driver.query_rows(guard.handle_mut(), &sql, sink).await
    }

    async fn find_keys(&self, key_columns: &[String]) -> Result<RecordBatch, ConfigError> {
        if key_columns.is_empty() {
            return Err(ConfigError::Invalid("find_keys requires at least one key column".to_string()));
        }
        Err(ConfigError::Invalid("find_keys requires a concrete driver-backed implementation".to_string()))
    }

    fn supports_key_finding(&self) -> bool {
        !self.key_columns.is_empty()
    }
}
