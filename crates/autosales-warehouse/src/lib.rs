//! Autosales Warehouse
//!
//! The PostgreSQL side of the vehicle-sales warehouse.
//!
//! # Features
//!
//! - Star-schema DDL (four dimensions, one fact table)
//! - Batched inserts through the core loader's sink seam
//! - Read-only verification queries
//!
//! # Usage
//!
//! ```rust,ignore
//! use autosales_warehouse::{ConnectionSettings, Warehouse};
//!
//! let warehouse = Warehouse::connect(settings).await?;
//! warehouse.create_schema(true).await?;
//! let summary = warehouse.load(&staged, 1000).await?;
//! let report = warehouse.verify(&config.project.verify).await?;
//! warehouse.close().await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod engine;
pub mod error;
pub mod postgres;
pub mod schema;
pub mod verify;

pub use connection::{ConnectionSettings, DatabaseCredentials};
pub use engine::Warehouse;
pub use error::{Error, Result};
pub use postgres::PgSink;
pub use verify::VerificationReport;
