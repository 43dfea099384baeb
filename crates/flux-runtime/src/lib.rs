//! Runtime: the Flow producer/consumer pipeline and the Coordinator
//! that fans out over many Flows with a concurrency cap.

pub mod coordinator;
pub mod flow;

pub use coordinator::{preview, run_coordinator, CoordinatorConfig, FlowPreview};
pub use flow::Flow;
