//! Error types for autosales-core

use thiserror::Error;

use crate::model::Dimension;

/// Result type alias for autosales-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in autosales-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// The dataset source answered with a non-success status
    #[error("download of {url} failed with HTTP {status}")]
    DownloadStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The dataset source could not be reached
    #[error("download of {url} failed: {source}")]
    Download {
        /// Requested URL
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Dataset archive could not be read
    #[error("failed to unpack archive {path}: {source}")]
    Archive {
        /// Archive path
        path: String,
        /// Underlying zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// The expected CSV file was not found after extraction
    #[error("dataset file '{file_name}' not found in {dir}")]
    DatasetFileMissing {
        /// File that was expected
        file_name: String,
        /// Directory that was searched
        dir: String,
    },

    /// Raw or staged file does not have the expected header
    #[error("{path}: missing column '{column}'")]
    MissingColumn {
        /// File path
        path: String,
        /// Column name
        column: String,
    },

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A staged value could not be parsed
    #[error("{path}:{line}: invalid {field} '{value}'")]
    InvalidValue {
        /// File path
        path: String,
        /// 1-based line number (header is line 1)
        line: u64,
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// A fact row referenced a natural key with no dimension row
    #[error("{path}:{line}: no {dimension} row for natural key '{key}'")]
    UnresolvedReference {
        /// Staged fact file
        path: String,
        /// 1-based line number
        line: u64,
        /// Dimension that failed to resolve
        dimension: Dimension,
        /// Natural key that was looked up
        key: String,
    },

    /// The warehouse sink rejected a batch
    #[error("sink error while writing {table}: {message}")]
    Sink {
        /// Target table
        table: &'static str,
        /// Description of the error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
