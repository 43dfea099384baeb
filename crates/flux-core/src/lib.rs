//! Behavioral core of the pipeline: retry, watermark tracking, the
//! connection pool, and the Home/Store contracts. No concrete Home or
//! Store variant lives here — see `flux-adapters`.

pub mod codec;
pub mod errors;
pub mod home;
pub mod path;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod store;
pub mod watermark;

pub use codec::{Blob, Codec, Driver, Format};
pub use errors::{CancellationError, ConfigError, FluxError, PersistenceError, PoolError, RetriesExhaustedError, SinkError, SourceError, TimeoutError};
pub use home::{BatchSink, Home};
pub use pool::{HandleFactory, Pool, PoolGuard};
pub use progress::{exit_code_for, CoordinatorSummary, FlowOutcome, FlowSummary, ProgressCounter, ProgressSnapshot};
pub use retry::{retry_with, RetryPolicy};
pub use store::{Store, StagingLedger, WriteStrategy};
pub use watermark::{WatermarkTracker, WatermarkValue};
