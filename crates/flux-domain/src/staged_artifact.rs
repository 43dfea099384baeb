//! A named output awaiting promotion from staging to its final location.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub staging_path: String,
    pub final_path: String,
    pub sequence: u64,
    pub row_count: u64,
}

impl StagedArtifact {
    pub fn new(staging_path: impl Into<String>, final_path: impl Into<String>, sequence: u64, row_count: u64) -> Self {
        Self {
            staging_path: staging_path.into(),
            final_path: final_path.into(),
            sequence,
            row_count,
        }
    }
}
