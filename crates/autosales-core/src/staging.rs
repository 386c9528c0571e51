//! Staged flat files
//!
//! The transformer writes one CSV per warehouse table into the staging
//! directory; the loader reads them back. Records are (de)serialized with
//! serde, so the header row always matches the model's field names.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{Dimension, FACT_TABLE};

/// Paths of the five staged files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTables {
    dir: PathBuf,
}

impl StagedTables {
    /// Staged files rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Staging directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the rows of a dimension
    pub fn dimension(&self, dimension: Dimension) -> PathBuf {
        self.dir.join(format!("{}.csv", dimension.table()))
    }

    /// File holding the fact rows
    pub fn facts(&self) -> PathBuf {
        self.dir.join(format!("{FACT_TABLE}.csv"))
    }

    /// All five files, dimensions first
    pub fn all(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = Dimension::ALL.iter().map(|d| self.dimension(*d)).collect();
        paths.push(self.facts());
        paths
    }

    /// True when every staged file exists
    pub fn is_complete(&self) -> bool {
        self.all().iter().all(|p| p.is_file())
    }
}

/// Write `records` to a CSV file with a header row, returning the row count
pub fn write_records<T, I>(path: &Path, records: I) -> Result<u64>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;
    for record in records {
        writer.serialize(record)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// A staged record with the line it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Line<T> {
    /// 1-based line number in the file (the header is line 1)
    pub number: u64,
    /// Parsed record
    pub record: T,
}

/// Read every record of a staged CSV file
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<Line<T>>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut lines = Vec::new();
    for row in reader.records() {
        let row = row?;
        let number = row.position().map(|p| p.line()).unwrap_or_default();
        let record = row.deserialize(Some(&headers)).map_err(|e| {
            tracing::debug!("{}:{}: {}", path.display(), number, e);
            Error::Csv(e)
        })?;
        lines.push(Line { number, record });
    }
    Ok(lines)
}
