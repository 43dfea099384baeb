//! Immutable columnar chunk handed between a Home and a Store.
//!
//! A `RecordBatch` is produced once by a Home and consumed once by a
//! Store; it is never mutated in place. The tagged-union `ColumnData`
//! plus an explicit `Schema` replaces the dynamically typed columns of
//! the system this pipeline is modeled after.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use indexmap::IndexMap;
use thiserror::Error;

use crate::logical_type::LogicalType;

pub type Schema = IndexMap<String, LogicalType>;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Utf8(Vec<Option<String>>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    DateTime(Vec<Option<DateTime<Utc>>>),
    Date(Vec<Option<NaiveDate>>),
    Time(Vec<Option<NaiveTime>>),
    /// Decimal stored as (unscaled value, scale) to avoid pulling in a
    /// bignum dependency.
    Decimal(Vec<Option<(i128, u32)>>),
    Binary(Vec<Option<Vec<u8>>>),
    Null(usize),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Time(v) => v.len(),
            ColumnData::Decimal(v) => v.len(),
            ColumnData::Binary(v) => v.len(),
            ColumnData::Null(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn logical_type(&self) -> LogicalType {
        match self {
            ColumnData::Utf8(_) => LogicalType::Utf8,
            ColumnData::Int(_) => LogicalType::Int,
            ColumnData::Float(_) => LogicalType::Float,
            ColumnData::Bool(_) => LogicalType::Bool,
            ColumnData::DateTime(_) => LogicalType::DateTime { has_tz: true },
            ColumnData::Date(_) => LogicalType::Date,
            ColumnData::Time(_) => LogicalType::Time,
            ColumnData::Decimal(..) => LogicalType::Decimal { precision: 38, scale: 0 },
            ColumnData::Binary(_) => LogicalType::Binary,
            ColumnData::Null(_) => LogicalType::Null,
        }
    }

    /// All-null check used by the watermark tracker.
    pub fn all_null(&self) -> bool {
        match self {
            ColumnData::Utf8(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Int(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Float(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Bool(v) => v.iter().all(|x| x.is_none()),
            ColumnData::DateTime(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Date(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Time(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Decimal(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Binary(v) => v.iter().all(|x| x.is_none()),
            ColumnData::Null(n) => *n > 0,
        }
    }

    fn slice(&self, start: usize, len: usize) -> ColumnData {
        match self {
            ColumnData::Utf8(v) => ColumnData::Utf8(v[start..start + len].to_vec()),
            ColumnData::Int(v) => ColumnData::Int(v[start..start + len].to_vec()),
            ColumnData::Float(v) => ColumnData::Float(v[start..start + len].to_vec()),
            ColumnData::Bool(v) => ColumnData::Bool(v[start..start + len].to_vec()),
            ColumnData::DateTime(v) => ColumnData::DateTime(v[start..start + len].to_vec()),
            ColumnData::Date(v) => ColumnData::Date(v[start..start + len].to_vec()),
            ColumnData::Time(v) => ColumnData::Time(v[start..start + len].to_vec()),
            ColumnData::Decimal(v) => ColumnData::Decimal(v[start..start + len].to_vec()),
            ColumnData::Binary(v) => ColumnData::Binary(v[start..start + len].to_vec()),
            ColumnData::Null(_) => ColumnData::Null(len),
        }
    }

    fn append(&mut self, other: ColumnData) -> Result<(), RecordBatchError> {
        match (self, other) {
            (ColumnData::Utf8(a), ColumnData::Utf8(mut b)) => a.append(&mut b),
            (ColumnData::Int(a), ColumnData::Int(mut b)) => a.append(&mut b),
            (ColumnData::Float(a), ColumnData::Float(mut b)) => a.append(&mut b),
            (ColumnData::Bool(a), ColumnData::Bool(mut b)) => a.append(&mut b),
            (ColumnData::DateTime(a), ColumnData::DateTime(mut b)) => a.append(&mut b),
            (ColumnData::Date(a), ColumnData::Date(mut b)) => a.append(&mut b),
            (ColumnData::Time(a), ColumnData::Time(mut b)) => a.append(&mut b),
            (ColumnData::Decimal(a), ColumnData::Decimal(mut b)) => a.append(&mut b),
            (ColumnData::Binary(a), ColumnData::Binary(mut b)) => a.append(&mut b),
            (ColumnData::Null(a), ColumnData::Null(b)) => *a += b,
            _ => return Err(RecordBatchError::TypeMismatch),
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RecordBatchError {
    #[error("column '{0}' declared in schema but missing from columns")]
    MissingColumn(String),
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    RowCountMismatch { column: String, expected: usize, actual: usize },
    #[error("schema declares type {declared} for column '{column}' but data is {actual}")]
    SchemaTypeMismatch { column: String, declared: String, actual: String },
    #[error("cannot concatenate columns of different variants")]
    TypeMismatch,
    #[error("column '{0}' not found in batch")]
    UnknownColumn(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    schema: Schema,
    columns: IndexMap<String, ColumnData>,
    row_count: usize,
}

impl RecordBatch {
    pub fn try_new(schema: Schema, columns: IndexMap<String, ColumnData>) -> Result<Self, RecordBatchError> {
        let row_count = columns.values().next().map(|c| c.len()).unwrap_or(0);
        for (name, logical) in &schema {
            let col = columns
                .get(name)
                .ok_or_else(|| RecordBatchError::MissingColumn(name.clone()))?;
            if col.len() != row_count {
                return Err(RecordBatchError::RowCountMismatch { column: name.clone(), expected: row_count, actual: col.len() });
            }
            if !matches!(col.logical_type(), LogicalType::Null) && col.logical_type() != *logical {
                return Err(RecordBatchError::SchemaTypeMismatch {
                    column: name.clone(),
                    declared: logical.to_string(),
                    actual: col.logical_type().to_string(),
                });
            }
        }
        Ok(Self { schema, columns, row_count })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }

    /// Project onto a subset of columns, preserving order. Used by the
    /// mirror deletion protocol's key-only reads.
    pub fn project(&self, names: &[String]) -> Result<RecordBatch, RecordBatchError> {
        let mut schema = Schema::new();
        let mut columns = IndexMap::new();
        for name in names {
            let logical = *self.schema.get(name).ok_or_else(|| RecordBatchError::UnknownColumn(name.clone()))?;
            let col = self.columns.get(name).ok_or_else(|| RecordBatchError::UnknownColumn(name.clone()))?;
            schema.insert(name.clone(), logical);
            columns.insert(name.clone(), col.clone());
        }
        RecordBatch::try_new(schema, columns)
    }

    /// Zero-copy-ish slice over `[start, start+len)`. Used to assemble
    /// exactly `batch_size` rows on flush and to split a batch into
    /// parallel-write chunks.
    pub fn slice(&self, start: usize, len: usize) -> RecordBatch {
        assert!(start + len <= self.row_count, "slice out of bounds");
        let columns = self.columns.iter().map(|(name, col)| (name.clone(), col.slice(start, len))).collect();
        RecordBatch { schema: self.schema.clone(), columns, row_count: len }
    }

    /// Append `other`'s rows after this batch's rows. Schemas must match
    /// exactly; used by the StoreBuffer to accumulate writes below
    /// `batch_size`.
    pub fn concat(mut self, other: RecordBatch) -> Result<RecordBatch, RecordBatchError> {
        if self.schema != other.schema {
            return Err(RecordBatchError::TypeMismatch);
        }
        for (name, col) in other.columns {
            let existing = self.columns.get_mut(&name).ok_or_else(|| RecordBatchError::UnknownColumn(name.clone()))?;
            existing.append(col)?;
        }
        self.row_count += other.row_count;
        Ok(self)
    }

    /// Split into roughly `chunk_count` equal pieces, used by the
    /// database Store's parallel writers.
    pub fn chunks(&self, chunk_count: usize) -> Vec<RecordBatch> {
        if chunk_count == 0 || self.row_count == 0 {
            return vec![];
        }
        let base = self.row_count / chunk_count;
        let remainder = self.row_count % chunk_count;
        let mut out = Vec::with_capacity(chunk_count);
        let mut offset = 0;
        for i in 0..chunk_count {
            let len = base + if i < remainder { 1 } else { 0 };
            if len == 0 {
                continue;
            }
            out.push(self.slice(offset, len));
            offset += len;
        }
        out
    }
}
