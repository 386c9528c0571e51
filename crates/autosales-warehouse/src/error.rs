//! Warehouse error types
//!
//! Database failures carry their stage through `anyhow::Context`; core
//! errors convert with `?`.

/// Result type for warehouse operations
pub type Result<T> = anyhow::Result<T>;

/// Warehouse error
pub type Error = anyhow::Error;
