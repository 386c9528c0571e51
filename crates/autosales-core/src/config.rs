//! Configuration parsing and validation
//!
//! This module handles loading and validating the `autosales.yaml` project
//! file. Every section has defaults, so a file containing only `name:` is a
//! valid configuration that downloads the public vehicle-sales dataset and
//! loads it into an embedded PostgreSQL server.
//!
//! Secrets are never read from this file. They are passed in explicitly as
//! [`Secret`] values by the caller.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default configuration file name
pub const CONFIG_FILE: &str = "autosales.yaml";

/// Root project configuration from `autosales.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Where the raw dataset comes from
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Working directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Warehouse database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Verification query settings
    #[serde(default)]
    pub verify: VerifyConfig,
}

/// Dataset source kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Kaggle dataset download API
    #[default]
    Kaggle,
    /// A CSV or ZIP file on disk
    Local,
}

/// Dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Source kind
    #[serde(default)]
    pub source: SourceKind,

    /// Dataset owner on Kaggle
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Dataset slug on Kaggle
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// CSV file inside the archive
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Kaggle API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Path of the local CSV or ZIP (for `source: local`)
    #[serde(default)]
    pub local_path: Option<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            owner: default_owner(),
            dataset: default_dataset(),
            file_name: default_file_name(),
            api_base: default_api_base(),
            local_path: None,
        }
    }
}

fn default_owner() -> String {
    "syedanwarafridi".to_string()
}

fn default_dataset() -> String {
    "vehicle-sales-data".to_string()
}

fn default_file_name() -> String {
    "car_prices.csv".to_string()
}

fn default_api_base() -> String {
    "https://www.kaggle.com/api/v1".to_string()
}

/// Working directories, relative to the project directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Downloaded and unpacked raw files
    #[serde(default = "default_raw_dir")]
    pub raw_dir: String,

    /// Transformed dimension and fact files
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            staging_dir: default_staging_dir(),
        }
    }
}

fn default_raw_dir() -> String {
    ".autosales/raw".to_string()
}

fn default_staging_dir() -> String {
    ".autosales/staging".to_string()
}

/// Database mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseMode {
    /// Managed embedded PostgreSQL, started and stopped by the pipeline
    #[default]
    Embedded,
    /// An already running PostgreSQL server
    External,
}

/// Warehouse database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Embedded or external server
    #[serde(default)]
    pub mode: DatabaseMode,

    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Login role
    #[serde(default = "default_username")]
    pub username: String,

    /// Data directory of the embedded server
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Rows per INSERT statement
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Drop existing warehouse tables before creating them
    #[serde(default = "default_true")]
    pub reset_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            mode: DatabaseMode::default(),
            host: default_host(),
            port: default_pg_port(),
            name: default_db_name(),
            username: default_username(),
            data_dir: default_data_dir(),
            batch_size: default_batch_size(),
            reset_schema: true,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5433 // Avoid conflict with system Postgres on 5432
}

fn default_db_name() -> String {
    "autosales".to_string()
}

fn default_username() -> String {
    "autosales".to_string()
}

fn default_data_dir() -> String {
    ".autosales/pg".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Verification query settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Rows returned by the top-N queries
    #[serde(default = "default_top_n")]
    pub top_n: u32,

    /// Start of the date-range summary (inclusive)
    #[serde(default)]
    pub date_from: Option<NaiveDate>,

    /// End of the date-range summary (inclusive)
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            date_from: None,
            date_to: None,
        }
    }
}

fn default_top_n() -> u32 {
    10
}

/// A secret value whose `Debug` and `Display` output is redacted
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret for use at the point of authentication
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Kaggle API credentials
#[derive(Debug, Clone)]
pub struct KaggleCredentials {
    /// Kaggle user name
    pub username: String,
    /// Kaggle API key
    pub key: Secret,
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory or an `autosales.yaml` file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./warehouse")?;
    /// println!("Project: {}", config.project.name);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join(CONFIG_FILE), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = serde_yaml::from_str(&contents)?;

        let config = Self { project, base_path };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let project = &self.project;
        if project.name.trim().is_empty() {
            return Err(invalid("project name must not be empty"));
        }
        if project.dataset.source == SourceKind::Local && project.dataset.local_path.is_none() {
            return Err(invalid("dataset.local_path is required when source is 'local'"));
        }
        if project.database.batch_size == 0 {
            return Err(invalid("database.batch_size must be at least 1"));
        }
        if project.verify.top_n == 0 {
            return Err(invalid("verify.top_n must be at least 1"));
        }
        if let (Some(from), Some(to)) = (project.verify.date_from, project.verify.date_to)
            && from > to
        {
            return Err(invalid(format!(
                "verify.date_from ({from}) is after verify.date_to ({to})"
            )));
        }
        Ok(())
    }

    /// Resolve a configured path against the project directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Directory for downloaded raw files
    pub fn raw_dir(&self) -> PathBuf {
        self.resolve(&self.project.paths.raw_dir)
    }

    /// Directory for staged dimension and fact files
    pub fn staging_dir(&self) -> PathBuf {
        self.resolve(&self.project.paths.staging_dir)
    }

    /// Data directory of the embedded server
    pub fn database_data_dir(&self) -> PathBuf {
        self.resolve(&self.project.database.data_dir)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigInvalid {
        message: message.into(),
    }
}
