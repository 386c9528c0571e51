//! Autosales Core Library
//!
//! This crate provides the database-independent half of the vehicle-sales
//! warehouse:
//! - Configuration parsing and validation
//! - The star-schema model (four dimensions, one fact table)
//! - Extract (dataset download and unpacking) and transform (normalize,
//!   deduplicate, stage)
//! - The loader and its [`WarehouseSink`] seam
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐     ┌───────────┐     ┌───────────┐     ┌───────────┐
//! │  Extract  │────▶│ Transform │────▶│  Staged   │────▶│  Loader   │──▶ sink
//! │ (raw CSV) │     │           │     │   CSVs    │     │           │
//! └───────────┘     └───────────┘     └───────────┘     └───────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use autosales_core::{Config, Loader, MemorySink, StagedTables};
//!
//! let config = Config::load("./autosales.yaml")?;
//! let staged = StagedTables::new(config.staging_dir());
//! let mut sink = MemorySink::new();
//! let summary = Loader::new(&mut sink, 1000).load(&staged).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod staging;
pub mod states;
pub mod transform;

pub use config::{Config, ProjectConfig, Secret};
pub use error::{Error, Result};
pub use extract::RawDataset;
pub use load::{LoadSummary, Loader};
pub use pipeline::Stage;
pub use sink::{MemorySink, WarehouseSink};
pub use staging::StagedTables;
pub use transform::TransformReport;
