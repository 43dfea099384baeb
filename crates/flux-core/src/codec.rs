//! Minimal codec/driver/blob capability interfaces. Concrete format and
//! driver support (Parquet/CSV, specific database drivers, specific
//! cloud object stores) are external collaborators; only the narrow
//! interface the core consumes lives here.

use async_trait::async_trait;
use flux_domain::RecordBatch;

use crate::errors::{PoolError, SinkError, SourceError};
use crate::home::BatchSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Parquet,
    Csv,
    Ndjson,
}

impl Format {
    pub fn suffix(self) -> &'static str {
        match self {
            Format::Parquet => "parquet",
            Format::Csv => "csv",
            Format::Ndjson => "ndjson",
        }
    }

    pub fn default_pattern(self) -> &'static str {
        match self {
            Format::Parquet => "{name}_{sequence:020d}.parquet",
            Format::Csv => "{name}_{sequence:020d}.csv",
            Format::Ndjson => "{name}_{sequence:020d}.ndjson",
        }
    }
}

#[async_trait]
pub trait Codec: Send + Sync {
    async fn read(&self, path: &str, format: Format, batch_size: usize, sink: &mut dyn BatchSink) -> Result<(), SourceError>;
    async fn write(&self, batch: &RecordBatch, path: &str, format: Format) -> Result<(), SinkError>;
}

#[async_trait]
pub trait Driver: Send + Sync {
    type Handle: Send + Sync;

    /// Opens one connection handle. Backs the generic connection pool's
    /// `HandleFactory::open` so a concrete driver never has to write its
    /// own pool wiring.
    async fn open_handle(&self) -> Result<Self::Handle, PoolError>;
    async fn close_handle(&self, handle: Self::Handle);
    async fn is_handle_alive(&self, handle: &Self::Handle) -> bool {
        let _ = handle;
        true
    }

    async fn execute_bulk_insert(&self, handle: &mut Self::Handle, table: &str, columns: &[String], rows: &RecordBatch) -> Result<(), SinkError>;
    async fn query_rows(&self, handle: &mut Self::Handle, sql: &str, sink: &mut dyn BatchSink) -> Result<(), SourceError>;
}

#[async_trait]
pub trait Blob: Send + Sync {
    async fn upload_bytes(&self, path: &str, bytes: Vec<u8>) -> Result<String, SinkError>;
    async fn read_bytes(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError>;
    async fn move_object(&self, src: &str, dst: &str) -> Result<(), SinkError>;
    async fn delete(&self, path: &str) -> Result<(), SinkError>;
    async fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), SinkError>;
    async fn exists(&self, path: &str) -> Result<bool, SourceError>;
    async fn ensure_parents(&self, path: &str) -> Result<(), SinkError>;
}
