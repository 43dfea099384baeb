//! Deletion-tagged RecordBatch builder used by the mirror Store variant.

use indexmap::IndexMap;

use crate::logical_type::LogicalType;
use crate::record_batch::{ColumnData, RecordBatch, RecordBatchError, Schema};

pub const ROW_MARKER_COLUMN: &str = "__rowMarker__";
pub const DELETE_TAG: i64 = 2;

/// Builds a RecordBatch containing only `keys`'s key columns plus a
/// `__rowMarker__` column set to the deletion tag on every row.
pub fn build_deletion_batch(keys: &RecordBatch) -> Result<RecordBatch, RecordBatchError> {
    let mut schema: Schema = keys.schema().clone();
    let mut columns: IndexMap<String, ColumnData> = keys
        .column_names()
        .map(|name| (name.to_string(), keys.column(name).unwrap().clone()))
        .collect();

    schema.insert(ROW_MARKER_COLUMN.to_string(), LogicalType::Int);
    columns.insert(
        ROW_MARKER_COLUMN.to_string(),
        ColumnData::Int(vec![Some(DELETE_TAG); keys.row_count()]),
    );

    RecordBatch::try_new(schema, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_batch::ColumnData;

    #[test]
    fn tags_every_row_with_delete_marker() {
        let mut schema = Schema::new();
        schema.insert("id".to_string(), LogicalType::Int);
        let mut columns = IndexMap::new();
        columns.insert("id".to_string(), ColumnData::Int(vec![Some(1), Some(2), Some(3)]));
        let keys = RecordBatch::try_new(schema, columns).unwrap();

        let deletions = build_deletion_batch(&keys).unwrap();
        assert_eq!(deletions.row_count(), 3);
        match deletions.column(ROW_MARKER_COLUMN).unwrap() {
            ColumnData::Int(values) => assert!(values.iter().all(|v| *v == Some(DELETE_TAG))),
            other => panic!("unexpected column kind: {other:?}"),
        }
    }
}
