//! Source contract: yields record batches, optionally filtered by a
//! watermark, optionally enumerating keys for the mirror-deletion
//! protocol.

use async_trait::async_trait;
use flux_domain::RecordBatch;

use crate::errors::{ConfigError, SourceError};

/// A finite sequence of batches, produced lazily. Concrete Homes stream
/// from a file reader or database cursor; the trait doesn't assume an
/// in-memory materialization.
#[async_trait]
pub trait Home: Send + Sync {
    /// Reads every batch in the underlying medium's insertion order.
    async fn read(&self, sink: &mut dyn BatchSink) -> Result<(), SourceError>;

    /// Reads only rows where `watermark_column > serialized_watermark`.
    /// The default falls back to a full `read()` with a logged warning,
    /// matching the documented incrementality loss for Homes that
    /// cannot safely rewrite their own query (e.g. custom SQL).
    async fn read_with_watermark(&self, serialized_watermark: &str, sink: &mut dyn BatchSink) -> Result<(), SourceError> {
        let _ = serialized_watermark;
        tracing::warn!("read_with_watermark not supported by this home; falling back to full read()");
        self.read(sink).await
    }

    /// Projects just the key columns, used by the mirror-deletion
    /// protocol. Only meaningful when `supports_key_finding()` is true.
    async fn find_keys(&self, key_columns: &[String]) -> Result<RecordBatch, ConfigError> {
        let _ = key_columns;
        Err(ConfigError::Invalid("this home does not support key finding".to_string()))
    }

    fn supports_key_finding(&self) -> bool {
        false
    }
}

/// Callback the producer passes to `Home::read`/`read_with_watermark` so
/// each batch can be enqueued as soon as it's available, without the
/// Home needing to know about the Flow's channel type.
#[async_trait]
pub trait BatchSink: Send {
    async fn accept(&mut self, batch: RecordBatch) -> Result<(), SourceError>;
}

/// Validates a watermark column or primary key name against the
/// security contract for watermark-injected predicates: simple
/// identifiers, optionally dotted.
pub fn is_safe_identifier(name: &str) -> bool {
    let segments: Vec<&str> = name.split('.').collect();
    !segments.is_empty()
        && segments.iter().all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
                _ => return false,
            }
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Escapes a literal string value for embedding in a driver query when
/// the driver has no parameter-binding path: wraps in single quotes and
/// doubles any embedded single quotes.
pub fn escape_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_and_dotted_identifiers() {
        assert!(is_safe_identifier("updated_at"));
        assert!(is_safe_identifier("schema.table.column"));
        assert!(is_safe_identifier("_private"));
    }

    #[test]
    fn rejects_identifiers_with_injection_risk() {
        assert!(!is_safe_identifier("updated_at; DROP TABLE x"));
        assert!(!is_safe_identifier("1col"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("a b"));
    }

    #[test]
    fn doubles_embedded_single_quotes() {
        assert_eq!(escape_string_literal("O'Brien"), "'O''Brien'");
    }
}
