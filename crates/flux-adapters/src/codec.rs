//! Newline-delimited JSON codec: the one concrete `Codec` implementation
//! sufficient for the S1–S6 scenarios against a real local filesystem.
//! Parquet/CSV support is an external collaborator out of scope here.

use std::io::{BufRead, BufReader, Write};

use async_trait::async_trait;
use indexmap::IndexMap;

use flux_core::errors::{SinkError, SourceError};
use flux_core::home::BatchSink;
use flux_core::{Codec, Format};
use flux_domain::{ColumnData, LogicalType, RecordBatch, Schema};

pub struct NdjsonCodec;

#[async_trait]
impl Codec for NdjsonCodec {
    async fn read(&self, path: &str, _format: Format, batch_size: usize, sink: &mut dyn BatchSink) -> Result<(), SourceError> {
        let path = path.to_string();
        let batch_size = batch_size.max(1);
        let rows: Vec<serde_json::Value> = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<serde_json::Value>> {
            let file = std::fs::File::open(&path)?;
            let reader = BufReader::new(file);
            let mut out = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                out.push(serde_json::from_str(&line).map_err(std::io::Error::other)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| SourceError::Io(e.to_string()))?
        .map_err(|e| SourceError::Io(e.to_string()))?;

        for chunk in rows.chunks(batch_size) {
            let batch = rows_to_batch(chunk).map_err(SourceError::Schema)?;
            sink.accept(batch).await?;
        }
        Ok(())
    }

    async fn write(&self, batch: &RecordBatch, path: &str, _format: Format) -> Result<(), SinkError> {
        let rows = batch_to_rows(batch);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if let Some(parent) = std::path::Path::new(&path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::File::create(&path)?;
            for row in rows {
                writeln!(file, "{}", serde_json::to_string(&row)?)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| SinkError::StagingWrite(e.to_string()))?
        .map_err(|e| SinkError::StagingWrite(e.to_string()))?;
        Ok(())
    }
}

fn batch_to_rows(batch: &RecordBatch) -> Vec<serde_json::Map<String, serde_json::Value>> {
    let mut rows = vec![serde_json::Map::new(); batch.row_count()];
    for name in batch.column_names() {
        let column = batch.column(name).unwrap();
        for (i, row) in rows.iter_mut().enumerate() {
            row.insert(name.to_string(), column_value_json(column, i));
        }
    }
    rows
}

fn column_value_json(column: &ColumnData, i: usize) -> serde_json::Value {
    use serde_json::Value;
    match column {
        ColumnData::Utf8(v) => v[i].clone().map(Value::from).unwrap_or(Value::Null),
        ColumnData::Int(v) => v[i].map(Value::from).unwrap_or(Value::Null),
        ColumnData::Float(v) => v[i].map(Value::from).unwrap_or(Value::Null),
        ColumnData::Bool(v) => v[i].map(Value::from).unwrap_or(Value::Null),
        ColumnData::DateTime(v) => v[i].map(|d| Value::from(d.to_rfc3339())).unwrap_or(Value::Null),
        ColumnData::Date(v) => v[i].map(|d| Value::from(d.to_string())).unwrap_or(Value::Null),
        ColumnData::Time(v) => v[i].map(|t| Value::from(t.to_string())).unwrap_or(Value::Null),
        ColumnData::Decimal(v) => v[i].map(|(unscaled, scale)| Value::from(format!("{unscaled}e-{scale}"))).unwrap_or(Value::Null),
        ColumnData::Binary(v) => v[i].clone().map(|b| Value::from(hex::encode(b))).unwrap_or(Value::Null),
        ColumnData::Null(_) => Value::Null,
    }
}

fn rows_to_batch(rows: &[serde_json::Value]) -> Result<RecordBatch, String> {
    let mut schema = Schema::new();
    let mut columns: IndexMap<String, ColumnData> = IndexMap::new();

    if let Some(serde_json::Value::Object(first)) = rows.first() {
        for (key, value) in first {
            let logical = infer_logical_type(value);
            schema.insert(key.clone(), logical);
        }
    }

    for (name, logical) in &schema {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or(serde_json::Value::Null))
            .collect();
        columns.insert(name.clone(), json_values_to_column(*logical, &values)?);
    }

    RecordBatch::try_new(schema, columns).map_err(|e| e.to_string())
}

fn infer_logical_type(value: &serde_json::Value) -> LogicalType {
    match value {
        serde_json::Value::String(_) => LogicalType::Utf8,
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => LogicalType::Int,
        serde_json::Value::Number(_) => LogicalType::Float,
        serde_json::Value::Bool(_) => LogicalType::Bool,
        _ => LogicalType::Utf8,
    }
}

fn json_values_to_column(logical: LogicalType, values: &[serde_json::Value]) -> Result<ColumnData, String> {
    match logical {
        LogicalType::Int => Ok(ColumnData::Int(values.iter().map(|v| v.as_i64()).collect())),
        LogicalType::Float => Ok(ColumnData::Float(values.iter().map(|v| v.as_f64()).collect())),
        LogicalType::Bool => Ok(ColumnData::Bool(values.iter().map(|v| v.as_bool()).collect())),
        LogicalType::Utf8 => Ok(ColumnData::Utf8(values.iter().map(|v| v.as_str().map(str::to_string)).collect())),
        other => Err(format!("unsupported inferred type {other} for ndjson codec")),
    }
}

mod hex {
    pub fn encode(bytes: Vec<u8>) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}
