use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::app::ports::RecordSourcePort;
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::{read_csv, RawTable};
use crate::pipeline::report::Stage;

/// Reads the snapshot from a local delimited file
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn unavailable(&self, reason: impl ToString) -> EtlError {
        EtlError::SourceUnavailable {
            stage: Stage::Source,
            source_name: self.describe(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl RecordSourcePort for CsvFileSource {
    async fn fetch_raw_rows(&self) -> Result<RawTable> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;
        let table = read_csv(bytes.as_slice()).map_err(|e| self.unavailable(e))?;
        info!(path = %self.path.display(), rows = table.len(), columns = table.schema.len(), "source loaded");
        Ok(table)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
