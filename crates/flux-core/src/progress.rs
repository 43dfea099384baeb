//! Milestone accounting for one flow run.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ProgressCounter {
    batches_read: AtomicU64,
    batches_written: AtomicU64,
    rows_read: AtomicU64,
    rows_written: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self, rows: u64) {
        self.batches_read.fetch_add(1, Ordering::Relaxed);
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_written(&self, rows: u64) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            batches_read: self.batches_read.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub batches_read: u64,
    pub batches_written: u64,
    pub rows_read: u64,
    pub rows_written: u64,
}

/// Per-flow result the Coordinator collects at the end of a run.
#[derive(Debug, Clone)]
pub struct FlowSummary {
    pub name: String,
    pub status: FlowOutcome,
    pub row_count: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorSummary {
    pub flows: Vec<FlowSummary>,
}

impl CoordinatorSummary {
    pub fn any_failed(&self) -> bool {
        self.flows.iter().any(|f| f.status != FlowOutcome::Succeeded)
    }
}

/// CLI-boundary exit code: `0` if every flow succeeded, `1` otherwise.
pub fn exit_code_for(summary: &CoordinatorSummary) -> i32 {
    if summary.any_failed() {
        1
    } else {
        0
    }
}
