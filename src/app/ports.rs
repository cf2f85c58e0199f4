use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::export::Table;
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::report::OutputDigest;

// Source-side port
#[async_trait]
pub trait RecordSourcePort: Send + Sync {
    /// Fetch the full raw snapshot. Any failure is `SourceUnavailable`.
    async fn fetch_raw_rows(&self) -> Result<RawTable>;

    /// Human-readable location of the source, for logs and the run report
    fn describe(&self) -> String;
}

// Output-side ports
pub trait TableWriterPort: Send + Sync {
    /// Start a set of files that are put in place together
    fn begin(&self) -> Box<dyn OutputBatch>;

    /// Write one table on its own, replacing any existing file atomically
    fn write_table(&self, path: &Path, table: &Table) -> Result<OutputDigest> {
        let mut batch = self.begin();
        let digest = batch.stage_table(path, table)?;
        batch.commit()?;
        Ok(digest)
    }

    /// Write a single document (metrics snapshot) the same way
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut batch = self.begin();
        batch.stage_bytes(path, bytes)?;
        batch.commit()
    }
}

/// Files staged beside their destinations. Nothing at a destination changes before `commit`,
/// and dropping an uncommitted batch discards everything staged.
pub trait OutputBatch: Send {
    fn stage_table(&mut self, path: &Path, table: &Table) -> Result<OutputDigest>;

    fn stage_bytes(&mut self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Replace every destination, or leave all of them as they were
    fn commit(self: Box<Self>) -> Result<()>;
}

pub trait TableReaderPort: Send + Sync {
    fn read_table(&self, path: &Path) -> Result<Table>;

    /// Raw file contents, for digest checks
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
}
