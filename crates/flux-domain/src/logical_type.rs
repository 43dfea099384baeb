//! Logical column types shared by every RecordBatch.
//!
//! Bounded and unbounded integer widths are deliberately folded into a
//! single `Int` variant: the pipeline never branches on width, only on
//! kind, so tracking it would be dead weight carried through every match.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Utf8,
    Int,
    Float,
    Bool,
    DateTime { has_tz: bool },
    Date,
    Time,
    Decimal { precision: u8, scale: u8 },
    Binary,
    Null,
}

impl LogicalType {
    /// Types the watermark tracker is allowed to compare and serialize.
    pub fn supports_watermark(&self) -> bool {
        matches!(self, LogicalType::Int | LogicalType::Utf8 | LogicalType::DateTime { .. })
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalType::Utf8 => write!(f, "utf8"),
            LogicalType::Int => write!(f, "int"),
            LogicalType::Float => write!(f, "float"),
            LogicalType::Bool => write!(f, "bool"),
            LogicalType::DateTime { has_tz } => write!(f, "datetime(tz={has_tz})"),
            LogicalType::Date => write!(f, "date"),
            LogicalType::Time => write!(f, "time"),
            LogicalType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            LogicalType::Binary => write!(f, "binary"),
            LogicalType::Null => write!(f, "null"),
        }
    }
}
