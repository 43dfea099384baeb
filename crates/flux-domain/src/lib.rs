//! Shared data types for the flowline pipeline: the RecordBatch wire
//! format, flow/watermark configuration, journal entries, and run-ID
//! hashing. No I/O lives here — see `flux-core` for behavior.

pub mod deletion_marker;
pub mod flow_config;
pub mod journal_entry;
pub mod logical_type;
pub mod pool_state;
pub mod record_batch;
pub mod run_id;
pub mod staged_artifact;
pub mod store_buffer;
pub mod watermark_config;

pub use deletion_marker::{build_deletion_batch, DELETE_TAG, ROW_MARKER_COLUMN};
pub use flow_config::{FlowConfig, FlowConfigError, RunType};
pub use journal_entry::{JournalEntry, JournalStatus, RunIdTriple};
pub use logical_type::LogicalType;
pub use pool_state::{HandleStatus, PoolCounts};
pub use record_batch::{ColumnData, RecordBatch, RecordBatchError, Schema};
pub use run_id::{generate_run_id, generate_run_id_triple};
pub use staged_artifact::StagedArtifact;
pub use store_buffer::StoreBuffer;
pub use watermark_config::WatermarkConfig;
