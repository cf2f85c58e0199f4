use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::app::ports::{OutputBatch, TableReaderPort, TableWriterPort};
use crate::error::{EtlError, Result};
use crate::pipeline::export::Table;
use crate::pipeline::report::{OutputDigest, Stage};

/// Hex SHA-256 of a byte buffer
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Reads and writes delimited tables on the local filesystem.
///
/// Writes are staged as temporary files in each destination directory and renamed over their
/// targets only on commit, so a failed run never leaves a truncated or half-updated output set.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableStore;

impl CsvTableStore {
    pub fn new() -> Self {
        Self
    }
}

impl TableWriterPort for CsvTableStore {
    fn begin(&self) -> Box<dyn OutputBatch> {
        Box::new(CsvOutputBatch::default())
    }
}

struct StagedFile {
    path: PathBuf,
    tmp: NamedTempFile,
    /// Row count, for tables
    rows: Option<usize>,
}

#[derive(Default)]
struct CsvOutputBatch {
    staged: Vec<StagedFile>,
}

fn table_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_failure(path: &Path, e: impl std::fmt::Display) -> EtlError {
    error!(path = %path.display(), error = %e, "write failed");
    crate::metrics::output::write_error(&table_label(path));
    EtlError::WriteFailure {
        stage: Stage::Export,
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn stage_file(path: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn previous_contents(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Put already replaced files back the way they were, newest first
fn roll_back(replaced: Vec<(PathBuf, Option<Vec<u8>>)>) {
    for (path, previous) in replaced.into_iter().rev() {
        let restored = match previous {
            Some(bytes) => stage_file(&path, &bytes)
                .and_then(|tmp| tmp.persist(&path).map(|_| ()).map_err(|e| e.error)),
            None => fs::remove_file(&path),
        };
        match restored {
            Ok(()) => debug!(path = %path.display(), "restored after failed commit"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not restore after failed commit"),
        }
    }
}

impl CsvOutputBatch {
    fn stage(&mut self, path: &Path, bytes: &[u8], rows: Option<usize>) -> Result<()> {
        let tmp = stage_file(path, bytes).map_err(|e| write_failure(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "file staged");
        self.staged.push(StagedFile {
            path: path.to_path_buf(),
            tmp,
            rows,
        });
        Ok(())
    }
}

impl OutputBatch for CsvOutputBatch {
    fn stage_table(&mut self, path: &Path, table: &Table) -> Result<OutputDigest> {
        let bytes = table.encode().map_err(|e| write_failure(path, e))?;
        self.stage(path, &bytes, Some(table.len()))?;
        Ok(OutputDigest {
            path: path.to_path_buf(),
            rows: table.len(),
            sha256: sha256_hex(&bytes),
        })
    }

    fn stage_bytes(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.stage(path, bytes, None)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut replaced = Vec::with_capacity(self.staged.len());
        let mut tables = Vec::new();

        // Unpersisted temp files left in the iterator are removed when it drops
        for staged in self.staged {
            let previous = match previous_contents(&staged.path) {
                Ok(previous) => previous,
                Err(e) => {
                    roll_back(replaced);
                    return Err(write_failure(&staged.path, e));
                }
            };
            if let Err(e) = staged.tmp.persist(&staged.path) {
                roll_back(replaced);
                return Err(write_failure(&staged.path, e.error));
            }
            if let Some(rows) = staged.rows {
                tables.push((table_label(&staged.path), rows));
            }
            replaced.push((staged.path, previous));
        }

        for (label, rows) in &tables {
            crate::metrics::output::rows_written(label, *rows);
        }
        debug!(files = replaced.len(), "batch committed");
        Ok(())
    }
}

impl TableReaderPort for CsvTableStore {
    fn read_table(&self, path: &Path) -> Result<Table> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EtlError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Table::decode(file).map_err(|e| EtlError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EtlError::NotFound {
                path: path.to_path_buf(),
            },
            _ => e.into(),
        })
    }
}
