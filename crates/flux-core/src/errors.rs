//! Error taxonomy shared by every flux-core component.
//!
//! Mirrors the kind-based split the pipeline's retry policy depends on:
//! `ConfigError` is never retried, `SourceError`/`SinkError` are
//! retryable by default, `TimeoutError` is retryable while attempts
//! remain, and `CancellationError` is never retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("{0}")]
    Invalid(String),
    #[error("unknown write strategy '{0}' (reserved: temp_swap, merge)")]
    UnknownWriteStrategy(String),
    #[error("mirror deletion source is unreachable: {0}")]
    UnreachableMirrorTarget(String),
    #[error("cannot infer key column types from an empty target")]
    EmptyMirrorTarget,
    #[error("unsafe identifier '{0}' rejected for watermark predicate injection")]
    UnsafeIdentifier(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("home I/O error: {0}")]
    Io(String),
    #[error("home schema error: {0}")]
    Schema(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("store staging write failed: {0}")]
    StagingWrite(String),
    #[error("store promotion failed: {0}")]
    Promotion(String),
    #[error("finish() left {0} artifact(s) unpromoted: {1:?}")]
    PartialPromotion(usize, Vec<String>),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
#[error("operation '{operation}' exceeded its {timeout_seconds}s wall timeout")]
pub struct TimeoutError {
    pub operation: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Error)]
#[error("cancelled: {0}")]
pub struct CancellationError(pub String);

#[derive(Debug, Error)]
#[error("retries exhausted after {attempts} attempt(s): {source}")]
pub struct RetriesExhaustedError {
    pub attempts: u32,
    #[source]
    pub source: Box<FluxError>,
}

/// Umbrella error threaded through the retry wrapper, Flow, and
/// Coordinator so a single `Result` type can flow between components
/// backed by different concrete error enums.
#[derive(Debug, Error)]
pub enum FluxError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Cancellation(#[from] CancellationError),
    #[error(transparent)]
    RetriesExhausted(#[from] RetriesExhaustedError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    RecordBatch(#[from] flux_domain::RecordBatchError),
}

impl FluxError {
    /// Retry-eligibility used by the retry wrapper's default kind
    /// matching. `should_retry` predicates may override this.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FluxError::Source(_) | FluxError::Sink(_) | FluxError::Timeout(_) | FluxError::Pool(PoolError::Transient(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool '{0}' exhausted or closed")]
    Exhausted(String),
    #[error("handle released twice")]
    DoubleRelease,
    #[error("transient resource error: {0}")]
    Transient(String),
    #[error("factory failed to open a handle: {0}")]
    OpenFailed(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization conflict, safe to retry: {0}")]
    SerializationConflict(String),
    #[error("transient I/O error, safe to retry: {0}")]
    TransientIo(String),
    #[error("unknown persistence error: {0}")]
    Unknown(String),
}

impl PersistenceError {
    /// Best-effort classification for errors that arrive as opaque
    /// strings from the underlying driver (deadlocks, closed
    /// connections, statement timeouts).
    pub fn is_retryable(&self) -> bool {
        match self {
            PersistenceError::SerializationConflict(_) | PersistenceError::TransientIo(_) => true,
            PersistenceError::Unknown(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("deadlock") || lower.contains("connection closed") || lower.contains("timeout")
            }
        }
    }
}
