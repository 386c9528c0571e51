//! PostgreSQL implementation of [`WarehouseSink`]

use async_trait::async_trait;
use autosales_core::model::{
    DateDim, Dimension, DimensionRecord, FACT_TABLE, Keyed, SalesFact, SellerDim, StateDim,
    VehicleDim,
};
use autosales_core::{Error as CoreError, Result as CoreResult, WarehouseSink};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Largest batch whose fact insert stays under PostgreSQL's 65535 bind
/// parameter limit (14 columns per fact row)
pub const MAX_BATCH_ROWS: usize = u16::MAX as usize / 14;

/// Writes batches with multi-row `INSERT ... VALUES` statements
#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    /// Sink writing through `pool`
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn execute(
        &self,
        table: &'static str,
        mut builder: QueryBuilder<'_, Postgres>,
    ) -> CoreResult<()> {
        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| sink_error(table, e))?;
        tracing::trace!("Inserted {} rows into {}", result.rows_affected(), table);
        Ok(())
    }
}

fn sink_error(table: &'static str, error: sqlx::Error) -> CoreError {
    CoreError::Sink {
        table,
        message: error.to_string(),
    }
}

fn insert_into<'a>(dimension: Dimension, columns: &str) -> QueryBuilder<'a, Postgres> {
    QueryBuilder::new(format!("INSERT INTO {} ({}) ", dimension.table(), columns))
}

#[async_trait]
impl WarehouseSink for PgSink {
    async fn write_dates(&mut self, rows: &[Keyed<DateDim>]) -> CoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder = insert_into(
            DateDim::DIMENSION,
            "date_key, sale_date, year, quarter, month, day, weekday",
        );
        builder.push_values(rows, |mut b, r| {
            b.push_bind(r.key)
                .push_bind(r.row.sale_date)
                .push_bind(r.row.year)
                .push_bind(r.row.quarter as i16)
                .push_bind(r.row.month as i16)
                .push_bind(r.row.day as i16)
                .push_bind(r.row.weekday as i16);
        });
        self.execute(DateDim::DIMENSION.table(), builder).await
    }

    async fn write_states(&mut self, rows: &[Keyed<StateDim>]) -> CoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder = insert_into(StateDim::DIMENSION, "state_key, state_code, state_name");
        builder.push_values(rows, |mut b, r| {
            b.push_bind(r.key)
                .push_bind(&r.row.state_code)
                .push_bind(&r.row.state_name);
        });
        self.execute(StateDim::DIMENSION.table(), builder).await
    }

    async fn write_sellers(&mut self, rows: &[Keyed<SellerDim>]) -> CoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder = insert_into(SellerDim::DIMENSION, "seller_key, seller_name");
        builder.push_values(rows, |mut b, r| {
            b.push_bind(r.key).push_bind(&r.row.seller_name);
        });
        self.execute(SellerDim::DIMENSION.table(), builder).await
    }

    async fn write_vehicles(&mut self, rows: &[Keyed<VehicleDim>]) -> CoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder = insert_into(
            VehicleDim::DIMENSION,
            "vehicle_key, year, make, model, trim",
        );
        builder.push_values(rows, |mut b, r| {
            b.push_bind(r.key)
                .push_bind(r.row.year)
                .push_bind(&r.row.make)
                .push_bind(&r.row.model)
                .push_bind(&r.row.trim);
        });
        self.execute(VehicleDim::DIMENSION.table(), builder).await
    }

    async fn write_sales(&mut self, rows: &[SalesFact]) -> CoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {FACT_TABLE} (sale_key, date_key, state_key, seller_key, vehicle_key, \
             vin, body, transmission, color, interior, condition, odometer, mmr, selling_price) "
        ));
        builder.push_values(rows, |mut b, r| {
            b.push_bind(r.sale_key)
                .push_bind(r.date_key)
                .push_bind(r.state_key)
                .push_bind(r.seller_key)
                .push_bind(r.vehicle_key)
                .push_bind(&r.vin)
                .push_bind(&r.body)
                .push_bind(&r.transmission)
                .push_bind(&r.color)
                .push_bind(&r.interior)
                .push_bind(r.condition)
                .push_bind(r.odometer)
                .push_bind(r.mmr)
                .push_bind(r.selling_price);
        });
        self.execute(FACT_TABLE, builder).await
    }
}
