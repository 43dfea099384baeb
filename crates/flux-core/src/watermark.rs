//! Per-flow-run watermark tracking, ported from the original
//! incremental-read helper.

use chrono::{DateTime, Utc};
use tracing::warn;

use flux_domain::{ColumnData, LogicalType, RecordBatch, Schema, WatermarkConfig};

use crate::errors::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkValue {
    Int(i64),
    Utf8(String),
    DateTime(DateTime<Utc>),
}

impl WatermarkValue {
    /// ISO 8601 for datetimes (offset preserved by `chrono`'s `Utc`
    /// rendering); natural textual form for ints and strings.
    pub fn serialize(&self) -> String {
        match self {
            WatermarkValue::Int(v) => v.to_string(),
            WatermarkValue::Utf8(v) => v.clone(),
            WatermarkValue::DateTime(v) => v.to_rfc3339(),
        }
    }

    fn logical_type(&self) -> LogicalType {
        match self {
            WatermarkValue::Int(_) => LogicalType::Int,
            WatermarkValue::Utf8(_) => LogicalType::Utf8,
            WatermarkValue::DateTime(_) => LogicalType::DateTime { has_tz: true },
        }
    }

    fn max(self, other: WatermarkValue) -> WatermarkValue {
        match (&self, &other) {
            (WatermarkValue::Int(a), WatermarkValue::Int(b)) => if b > a { other } else { self },
            (WatermarkValue::Utf8(a), WatermarkValue::Utf8(b)) => if b > a { other } else { self },
            (WatermarkValue::DateTime(a), WatermarkValue::DateTime(b)) => if b > a { other } else { self },
            _ => self,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    config: WatermarkConfig,
    current: Option<WatermarkValue>,
    warned_type_mismatch: bool,
}

impl WatermarkTracker {
    pub fn new(config: WatermarkConfig) -> Self {
        Self { config, current: None, warned_type_mismatch: false }
    }

    /// Fails fast if the primary key or watermark column is missing
    /// from `schema`, or the watermark column's logical type cannot be
    /// compared/serialized.
    pub fn validate_schema(&self, schema: &Schema) -> Result<(), ConfigError> {
        if let Some(pk) = &self.config.primary_key {
            if !schema.contains_key(pk) {
                return Err(ConfigError::MissingField(pk.clone()));
            }
        }
        let watermark_type = schema
            .get(&self.config.watermark_column)
            .ok_or_else(|| ConfigError::MissingField(self.config.watermark_column.clone()))?;
        if !watermark_type.supports_watermark() {
            return Err(ConfigError::Invalid(format!(
                "watermark column '{}' has unsupported type {watermark_type}",
                self.config.watermark_column
            )));
        }
        Ok(())
    }

    /// Scans the configured column in `batch`, updating the running
    /// maximum. All-null columns are ignored; a type change from a
    /// prior batch logs a warning rather than failing.
    pub fn update(&mut self, batch: &RecordBatch) {
        let Some(column) = batch.column(&self.config.watermark_column) else {
            return;
        };
        if column.all_null() {
            return;
        }

        let values = extract_values(column);
        let Some(batch_max) = values.into_iter().flatten().max_by(|a, b| compare_values(a, b)) else {
            return;
        };

        if let Some(existing) = &self.current {
            if existing.logical_type() != batch_max.logical_type() && !self.warned_type_mismatch {
                warn!(
                    column = %self.config.watermark_column,
                    "watermark column changed type across batches; continuing with best-effort comparison"
                );
                self.warned_type_mismatch = true;
            }
        }

        self.current = Some(match self.current.take() {
            Some(existing) if existing.logical_type() == batch_max.logical_type() => existing.max(batch_max),
            Some(existing) => existing,
            None => batch_max,
        });
    }

    pub fn current(&self) -> Option<&WatermarkValue> {
        self.current.as_ref()
    }

    pub fn serialize(&self) -> Option<String> {
        self.current.as_ref().map(|v| v.serialize())
    }
}

fn compare_values(a: &WatermarkValue, b: &WatermarkValue) -> std::cmp::Ordering {
    match (a, b) {
        (WatermarkValue::Int(a), WatermarkValue::Int(b)) => a.cmp(b),
        (WatermarkValue::Utf8(a), WatermarkValue::Utf8(b)) => a.cmp(b),
        (WatermarkValue::DateTime(a), WatermarkValue::DateTime(b)) => a.cmp(b),
        _ => std::cmp::Ordering::Equal,
    }
}

fn extract_values(column: &ColumnData) -> Vec<Option<WatermarkValue>> {
    match column {
        ColumnData::Int(v) => v.iter().map(|x| x.map(WatermarkValue::Int)).collect(),
        ColumnData::Utf8(v) => v.iter().map(|x| x.clone().map(WatermarkValue::Utf8)).collect(),
        ColumnData::DateTime(v) => v.iter().map(|x| x.map(WatermarkValue::DateTime)).collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn int_batch(col: &str, values: Vec<Option<i64>>) -> RecordBatch {
        let mut schema = Schema::new();
        schema.insert(col.to_string(), LogicalType::Int);
        let mut columns = IndexMap::new();
        columns.insert(col.to_string(), ColumnData::Int(values));
        RecordBatch::try_new(schema, columns).unwrap()
    }

    #[test]
    fn tracks_pairwise_maximum_across_batches() {
        let mut tracker = WatermarkTracker::new(WatermarkConfig::new("updated_at"));
        tracker.update(&int_batch("updated_at", vec![Some(1), Some(5), Some(3)]));
        tracker.update(&int_batch("updated_at", vec![Some(2), Some(4)]));
        assert_eq!(tracker.serialize(), Some("5".to_string()));
    }

    #[test]
    fn ignores_all_null_columns() {
        let mut tracker = WatermarkTracker::new(WatermarkConfig::new("updated_at"));
        tracker.update(&int_batch("updated_at", vec![Some(7)]));
        tracker.update(&int_batch("updated_at", vec![None, None]));
        assert_eq!(tracker.serialize(), Some("7".to_string()));
    }

    #[test]
    fn validate_schema_rejects_missing_watermark_column() {
        let tracker = WatermarkTracker::new(WatermarkConfig::new("missing_col"));
        let mut schema = Schema::new();
        schema.insert("id".to_string(), LogicalType::Int);
        assert!(tracker.validate_schema(&schema).is_err());
    }
}
