//! Local-file Home: reads every file matching a pattern under `path`,
//! yielding batches of at most `batch_size` rows each.

use std::sync::Arc;

use async_trait::async_trait;

use flux_core::errors::SourceError;
use flux_core::home::BatchSink;
use flux_core::{Codec, Format, Home};

pub struct LocalHome<C: Codec + ?Sized> {
    pub path: String,
    pub format: Format,
    pub batch_size: usize,
    pub codec: Arc<C>,
}

impl<C: Codec + ?Sized> LocalHome<C> {
    pub fn new(path: impl Into<String>, format: Format, batch_size: usize, codec: Arc<C>) -> Self {
        Self { path: path.into(), format, batch_size, codec }
    }

    fn source_files(&self) -> Result<Vec<String>, SourceError> {
        let suffix = self.format.suffix();
        let mut files: Vec<String> = std::fs::read_dir(&self.path)
            .map_err(|e| SourceError::Io(format!("reading {}: {e}", self.path)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(suffix))
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl<C: Codec + ?Sized> Home for LocalHome<C> {
    async fn read(&self, sink: &mut dyn BatchSink) -> Result<(), SourceError> {
        for file in self.source_files()? {
            self.codec.read(&file, self.format, self.batch_size, sink).await?;
        }
        Ok(())
    }
}
