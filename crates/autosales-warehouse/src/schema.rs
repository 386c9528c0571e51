//! Star-schema DDL
//!
//! Dimensions carry a primary surrogate key and a UNIQUE natural key. The
//! fact table's foreign keys reference the dimension primary keys, so the
//! database itself rejects a fact row whose dimension row is missing.

use anyhow::Context;
use sqlx::PgPool;

use crate::error::Result;

/// Drops every warehouse table, fact table first
pub const DROP_TABLES: &str =
    "DROP TABLE IF EXISTS sales_fact, vehicle_dim, seller_dim, state_dim, date_dim";

/// CREATE TABLE statements, dimensions first
pub const CREATE_TABLES: [&str; 5] = [
    r#"CREATE TABLE date_dim (
    date_key   INTEGER PRIMARY KEY,
    sale_date  DATE NOT NULL UNIQUE,
    year       INTEGER NOT NULL,
    quarter    SMALLINT NOT NULL,
    month      SMALLINT NOT NULL,
    day        SMALLINT NOT NULL,
    weekday    SMALLINT NOT NULL
)"#,
    r#"CREATE TABLE state_dim (
    state_key  INTEGER PRIMARY KEY,
    state_code TEXT NOT NULL UNIQUE,
    state_name TEXT NOT NULL
)"#,
    r#"CREATE TABLE seller_dim (
    seller_key  INTEGER PRIMARY KEY,
    seller_name TEXT NOT NULL UNIQUE
)"#,
    r#"CREATE TABLE vehicle_dim (
    vehicle_key INTEGER PRIMARY KEY,
    year        INTEGER NOT NULL,
    make        TEXT NOT NULL,
    model       TEXT NOT NULL,
    trim        TEXT NOT NULL,
    UNIQUE (year, make, model, trim)
)"#,
    r#"CREATE TABLE sales_fact (
    sale_key      BIGINT PRIMARY KEY,
    date_key      INTEGER NOT NULL REFERENCES date_dim (date_key),
    state_key     INTEGER NOT NULL REFERENCES state_dim (state_key),
    seller_key    INTEGER NOT NULL REFERENCES seller_dim (seller_key),
    vehicle_key   INTEGER NOT NULL REFERENCES vehicle_dim (vehicle_key),
    vin           TEXT,
    body          TEXT,
    transmission  TEXT,
    color         TEXT,
    interior      TEXT,
    condition     DOUBLE PRECISION,
    odometer      BIGINT,
    mmr           BIGINT,
    selling_price BIGINT NOT NULL
)"#,
];

/// Create the warehouse tables, dropping existing ones first when `reset`
pub async fn create(pool: &PgPool, reset: bool) -> Result<()> {
    if reset {
        tracing::debug!("Dropping existing warehouse tables");
        sqlx::query(DROP_TABLES)
            .execute(pool)
            .await
            .context("Failed to drop existing tables")?;
    }

    for ddl in CREATE_TABLES {
        let table = table_name(ddl);
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create table {table}"))?;
        tracing::debug!("Created table {}", table);
    }

    tracing::info!("Created {} warehouse tables", CREATE_TABLES.len());
    Ok(())
}

fn table_name(ddl: &str) -> &str {
    ddl.trim_start_matches("CREATE TABLE ")
        .split_whitespace()
        .next()
        .unwrap_or("?")
}
