//! Loading a tracking file end to end
//!
//! A [`Pipeline`] holds the load-time settings and runs ingestion, column
//! validation and field derivation in one call.

use crate::dataset::{Dataset, FrameRate, RowPolicy};
use crate::error::Result;
use crate::{ingest, schema};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    pub frame_rate: FrameRate,
    pub row_policy: RowPolicy,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Parse, validate and derive an uploaded file.
    ///
    /// A missing column comes back as [`crate::Error::Schema`] before any row
    /// is looked at.
    pub fn load_bytes(&self, bytes: &[u8], file_name: &str) -> Result<Dataset> {
        let raw = ingest::load(bytes, file_name)?;
        debug!(file = file_name, rows = raw.len(), columns = raw.columns.len(), "parsed");

        let validated = schema::validate(raw)?;
        let dataset = Dataset::derive(file_name, &validated, self.frame_rate, self.row_policy)?;

        info!(
            file = file_name,
            detections = dataset.len(),
            skipped = dataset.skipped_rows,
            fps = self.frame_rate.get(),
            "File loaded: {}",
            file_name
        );
        Ok(dataset)
    }

    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Dataset> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_bytes(&bytes, &name)
    }
}
