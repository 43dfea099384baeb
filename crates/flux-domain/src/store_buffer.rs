//! Below-threshold row accumulator owned by one Store for one flow run.

use crate::record_batch::{RecordBatch, RecordBatchError};

#[derive(Debug, Clone, Default)]
pub struct StoreBuffer {
    batch: Option<RecordBatch>,
    sequence_counter: u64,
}

impl StoreBuffer {
    pub fn new() -> Self {
        Self { batch: None, sequence_counter: 0 }
    }

    /// Resumes sequence numbering from `next`, used when the final
    /// directory already contains artifacts from a prior run.
    pub fn resume_from(next: u64) -> Self {
        Self { batch: None, sequence_counter: next }
    }

    pub fn row_count(&self) -> usize {
        self.batch.as_ref().map(|b| b.row_count()).unwrap_or(0)
    }

    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }

    pub fn push(&mut self, incoming: RecordBatch) -> Result<(), RecordBatchError> {
        self.batch = Some(match self.batch.take() {
            Some(existing) => existing.concat(incoming)?,
            None => incoming,
        });
        Ok(())
    }

    /// Pulls exactly `batch_size` rows if enough are buffered, advancing
    /// the sequence counter and leaving the remainder buffered.
    pub fn take_full(&mut self, batch_size: usize) -> Option<(u64, RecordBatch)> {
        let available = self.row_count();
        if available < batch_size || batch_size == 0 {
            return None;
        }
        let current = self.batch.take()?;
        let head = current.slice(0, batch_size);
        let remainder = current.slice(batch_size, available - batch_size);
        self.batch = if remainder.is_empty() { None } else { Some(remainder) };
        let seq = self.sequence_counter;
        self.sequence_counter += 1;
        Some((seq, head))
    }

    /// Flushes whatever remains, regardless of `batch_size`. Used on
    /// `finish()`.
    pub fn take_residual(&mut self) -> Option<(u64, RecordBatch)> {
        let current = self.batch.take()?;
        if current.is_empty() {
            return None;
        }
        let seq = self.sequence_counter;
        self.sequence_counter += 1;
        Some((seq, current))
    }

    /// Resets buffer and sequence counter to zero, per the Store's
    /// retry-sensitive-state contract.
    pub fn reset_retry_sensitive_state(&mut self) {
        self.batch = None;
        self.sequence_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical_type::LogicalType;
    use crate::record_batch::{ColumnData, Schema};
    use indexmap::IndexMap;

    fn batch(n: usize) -> RecordBatch {
        let mut schema = Schema::new();
        schema.insert("id".to_string(), LogicalType::Int);
        let mut columns = IndexMap::new();
        columns.insert("id".to_string(), ColumnData::Int((0..n as i64).map(Some).collect()));
        RecordBatch::try_new(schema, columns).unwrap()
    }

    #[test]
    fn reset_zeroes_counter_and_buffer() {
        let mut buf = StoreBuffer::new();
        buf.push(batch(5)).unwrap();
        buf.take_full(5).unwrap();
        assert_eq!(buf.sequence_counter(), 1);
        buf.reset_retry_sensitive_state();
        assert_eq!(buf.sequence_counter(), 0);
        assert_eq!(buf.row_count(), 0);
    }

    #[test]
    fn take_full_leaves_remainder_buffered() {
        let mut buf = StoreBuffer::new();
        buf.push(batch(12)).unwrap();
        let (seq, flushed) = buf.take_full(5).unwrap();
        assert_eq!(seq, 0);
        assert_eq!(flushed.row_count(), 5);
        assert_eq!(buf.row_count(), 7);
    }
}
