//! Database Store: buffers to `batch_size`, then splits each flush into
//! `parallel_workers` chunks written concurrently through the pool.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use flux_core::errors::{ConfigError, SinkError};
use flux_core::pool::{HandleFactory, Pool};
use flux_core::store::{Store, WriteStrategy};
use flux_core::Driver;
use flux_domain::{RecordBatch, RunType, StoreBuffer};

use crate::homes::database::DriverFactory;

pub struct DatabaseStore<D: Driver> {
    pub table: String,
    pub entity_name: Option<String>,
    pub columns: Vec<String>,
    pub batch_size: usize,
    pub parallel_workers: usize,
    pub write_strategy: WriteStrategy,
    pool: Option<Arc<Pool<DriverFactory<D>>>>,
    driver: Arc<D>,
    buffer: StoreBuffer,
}

impl<D: Driver + 'static> DatabaseStore<D> {
    pub fn new(
        table: impl Into<String>,
        entity_name: Option<String>,
        columns: Vec<String>,
        batch_size: usize,
        parallel_workers: usize,
        write_strategy: WriteStrategy,
        pool: Option<Arc<Pool<DriverFactory<D>>>>,
        driver: Arc<D>,
    ) -> Self {
        Self {
            table: table.into(),
            entity_name,
            columns,
            batch_size,
            parallel_workers,
            write_strategy,
            pool,
            driver,
            buffer: StoreBuffer::new(),
        }
    }

    fn resolved_table(&self) -> String {
        match &self.entity_name {
            Some(entity) => self.table.replace("{entity}", entity),
            None => self.table.clone(),
        }
    }

    /// Splits `batch` into `parallel_workers` chunks and writes them
    /// concurrently; falls back to a single-connection path when no
    /// pool was supplied (unit tests, or a caller without one).
    async fn write_parallel(&self, batch: RecordBatch) -> Result<(), SinkError> {
        let Some(pool) = &self.pool else {
            return self.write_single(batch).await;
        };

        let chunks = batch.chunks(self.parallel_workers.max(1));
        let mut joins = JoinSet::new();
        for chunk in chunks {
            let pool = Arc::clone(pool);
            let driver = Arc::clone(&self.driver);
            let table = self.resolved_table();
            let columns = self.columns.clone();
            joins.spawn(async move {
                let mut guard = pool.acquire().await.map_err(|e| SinkError::StagingWrite(e.to_string()))?;
                driver.execute_bulk_insert(guard.handle_mut(), &table, &columns, &chunk).await
            });
        }

        // The batch is acknowledged only after every chunk succeeds;
        // chunk ordering is not guaranteed or required.
        while let Some(result) = joins.join_next().await {
            result.map_err(|e| SinkError::StagingWrite(e.to_string()))??;
        }
        Ok(())
    }

    async fn write_single(&self, batch: RecordBatch) -> Result<(), SinkError> {
        let Some(pool) = &self.pool else {
            return Err(SinkError::StagingWrite("no pool configured for single-connection fallback".to_string()));
        };
        let mut guard = pool.acquire().await.map_err(|e| SinkError::StagingWrite(e.to_string()))?;
        self.driver.execute_bulk_insert(guard.handle_mut(), &self.resolved_table(), &self.columns, &batch).await
    }
}

#[async_trait]
impl<D: Driver + 'static> Store for DatabaseStore<D> {
    async fn configure_for_run(&mut self, _run_type: RunType) -> Result<(), ConfigError> {
        self.write_strategy.require_implemented()?;
        self.buffer.reset_retry_sensitive_state();
        Ok(())
    }

    async fn before_flow_start(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write(&mut self, batch: RecordBatch) -> Result<(), SinkError> {
        self.buffer.push(batch).map_err(|e| SinkError::StagingWrite(e.to_string()))?;
        while let Some((_, chunk)) = self.buffer.take_full(self.batch_size) {
            if self.parallel_workers > 1 && self.pool.is_some() {
                self.write_parallel(chunk).await?;
            } else {
                self.write_single(chunk).await?;
            }
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        if let Some((_, residual)) = self.buffer.take_residual() {
            if self.parallel_workers > 1 && self.pool.is_some() {
                self.write_parallel(residual).await?;
            } else {
                self.write_single(residual).await?;
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.finish().await
    }

    fn reset_retry_sensitive_state(&mut self) {
        self.buffer.reset_retry_sensitive_state();
    }
}
