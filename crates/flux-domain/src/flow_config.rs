//! Configuration surface for a single Flow.

use serde::{Deserialize, Serialize};

use crate::watermark_config::WatermarkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunType {
    FullDrop,
    Incremental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub name: String,
    pub home_spec: String,
    pub store_spec: String,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    pub entity_name: Option<String>,
    pub run_type: RunType,
    pub watermark_config: Option<WatermarkConfig>,
}

fn default_queue_size() -> usize {
    10
}

fn default_timeout_seconds() -> u64 {
    300
}

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum FlowConfigError {
    #[error("queue_size must be >= 1, got {0}")]
    QueueSizeTooSmall(usize),
}

impl FlowConfig {
    pub fn validate(&self) -> Result<(), FlowConfigError> {
        if self.queue_size < 1 {
            return Err(FlowConfigError::QueueSizeTooSmall(self.queue_size));
        }
        Ok(())
    }
}
