//! Name→type lookup for Home/Store variants, binding configuration to
//! a concrete adapter without the caller needing to match on variant
//! names directly.

use std::sync::Arc;

use flux_core::errors::ConfigError;
use flux_core::{Codec, Format, Home};

use crate::codec::NdjsonCodec;
use crate::homes::local::LocalHome;

#[derive(Debug, Clone)]
pub struct LocalHomeSpec {
    pub path: String,
    pub format: Format,
    pub batch_size: usize,
}

/// Registry of Home constructors keyed by variant name. Only the
/// `local` variant is registered by default; database/blob variants
/// require a driver instance the registry has no way to manufacture
/// generically, so callers register those directly with their own
/// driver.
pub struct HomeRegistry {
    codec: Arc<dyn Codec>,
}

impl HomeRegistry {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    pub fn with_default_codec() -> Self {
        Self::new(Arc::new(NdjsonCodec))
    }

    pub fn build_local(&self, spec: LocalHomeSpec) -> Result<Arc<dyn Home>, ConfigError> {
        if spec.path.trim().is_empty() {
            return Err(ConfigError::MissingField("path".to_string()));
        }
        Ok(Arc::new(LocalHome::new(spec.path, spec.format, spec.batch_size, Arc::clone(&self.codec))))
    }
}
