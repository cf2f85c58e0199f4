//! Raw table shapes handed from a record source to the validator.
//!
//! Rows are kept as optional text cells until the normalizer decodes them, so the
//! validator can compare rows field-for-field exactly as the source delivered them.

use std::io::Read;
use std::sync::Arc;

use crate::error::Result;

/// Ordered column names exactly as the source provided them, typos included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSchema {
    columns: Vec<String>,
}

impl RawSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// One raw row. An empty cell is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawRecord {
    values: Vec<Option<String>>,
}

impl RawRecord {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Build a row from plain strings, treating "" as null
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            values: cells.into_iter().map(|c| cell(c.as_ref())).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }
}

/// The full raw row set of one snapshot
#[derive(Debug, Clone)]
pub struct RawTable {
    pub schema: Arc<RawSchema>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(schema: RawSchema, records: Vec<RawRecord>) -> Self {
        Self {
            schema: Arc::new(schema),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn cell(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a delimited table with a header row. Header names are trimmed; cells are not.
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(RawRecord::new(row.iter().map(cell).collect()));
    }

    Ok(RawTable::new(RawSchema::new(columns), records))
}
