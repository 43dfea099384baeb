//! Per-flow watermark configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    pub primary_key: Option<String>,
    pub watermark_column: String,
    /// When `true` (the default), an unsafe column/key name falls back
    /// to a full reload with a warning. When `false`, the same
    /// condition raises a configuration error instead of silently
    /// widening the read.
    #[serde(default = "default_allow_unsafe_watermark_fallback")]
    pub allow_unsafe_watermark_fallback: bool,
}

fn default_allow_unsafe_watermark_fallback() -> bool {
    true
}

impl WatermarkConfig {
    pub fn new(watermark_column: impl Into<String>) -> Self {
        Self {
            primary_key: None,
            watermark_column: watermark_column.into(),
            allow_unsafe_watermark_fallback: true,
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }
}
