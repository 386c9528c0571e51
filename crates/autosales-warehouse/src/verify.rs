//! Verification queries
//!
//! Every query here is a read-only `SELECT`. The results are collected into a
//! [`VerificationReport`] whose `Display` impl renders the tables printed by
//! the CLI.

use std::fmt;

use anyhow::Context;
use autosales_core::config::VerifyConfig;
use autosales_core::model::{Dimension, FACT_TABLE};
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::error::Result;

/// Fact rows whose foreign keys do not join to a dimension row
pub const ORPHANED_FACTS: &str = r#"SELECT COUNT(*)
FROM sales_fact f
LEFT JOIN date_dim d ON d.date_key = f.date_key
LEFT JOIN state_dim s ON s.state_key = f.state_key
LEFT JOIN seller_dim sl ON sl.seller_key = f.seller_key
LEFT JOIN vehicle_dim v ON v.vehicle_key = f.vehicle_key
WHERE d.date_key IS NULL
   OR s.state_key IS NULL
   OR sl.seller_key IS NULL
   OR v.vehicle_key IS NULL"#;

/// Sale count and revenue per state
pub const SALES_BY_STATE: &str = r#"SELECT s.state_code,
       s.state_name,
       COUNT(*) AS sales,
       SUM(f.selling_price)::BIGINT AS total_price
FROM sales_fact f
JOIN state_dim s ON s.state_key = f.state_key
GROUP BY s.state_code, s.state_name
ORDER BY total_price DESC, s.state_code"#;

/// Sellers ranked by revenue
pub const TOP_SELLERS: &str = r#"SELECT sl.seller_name,
       COUNT(*) AS sales,
       SUM(f.selling_price)::BIGINT AS total_price
FROM sales_fact f
JOIN seller_dim sl ON sl.seller_key = f.seller_key
GROUP BY sl.seller_name
ORDER BY total_price DESC, sl.seller_name
LIMIT $1"#;

/// Sale count and revenue per calendar month
pub const SALES_BY_MONTH: &str = r#"SELECT d.year,
       d.month,
       COUNT(*) AS sales,
       SUM(f.selling_price)::BIGINT AS total_price
FROM sales_fact f
JOIN date_dim d ON d.date_key = f.date_key
GROUP BY d.year, d.month
ORDER BY d.year, d.month"#;

/// Totals for sales inside an inclusive date window; NULL bounds are open
pub const DATE_RANGE_SUMMARY: &str = r#"SELECT MIN(d.sale_date) AS first_sale,
       MAX(d.sale_date) AS last_sale,
       COUNT(*) AS sales,
       COALESCE(SUM(f.selling_price), 0)::BIGINT AS total_price,
       AVG(f.selling_price)::DOUBLE PRECISION AS average_price
FROM sales_fact f
JOIN date_dim d ON d.date_key = f.date_key
WHERE ($1::DATE IS NULL OR d.sale_date >= $1)
  AND ($2::DATE IS NULL OR d.sale_date <= $2)"#;

/// Makes ranked by sale count
pub const TOP_MAKES: &str = r#"SELECT v.make,
       COUNT(*) AS sales,
       AVG(f.selling_price)::DOUBLE PRECISION AS average_price
FROM sales_fact f
JOIN vehicle_dim v ON v.vehicle_key = f.vehicle_key
GROUP BY v.make
ORDER BY sales DESC, v.make
LIMIT $1"#;

/// Every fixed query, by name
pub fn queries() -> [(&'static str, &'static str); 6] {
    [
        ("orphaned_facts", ORPHANED_FACTS),
        ("sales_by_state", SALES_BY_STATE),
        ("top_sellers", TOP_SELLERS),
        ("sales_by_month", SALES_BY_MONTH),
        ("date_range_summary", DATE_RANGE_SUMMARY),
        ("top_makes", TOP_MAKES),
    ]
}

/// Row of `sales_by_state`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StateSales {
    /// Two-letter code
    pub state_code: String,
    /// Full name
    pub state_name: String,
    /// Number of sales
    pub sales: i64,
    /// Sum of selling prices
    pub total_price: i64,
}

/// Row of `top_sellers`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SellerSales {
    /// Normalized seller name
    pub seller_name: String,
    /// Number of sales
    pub sales: i64,
    /// Sum of selling prices
    pub total_price: i64,
}

/// Row of `sales_by_month`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MonthSales {
    /// Calendar year
    pub year: i32,
    /// Month, 1-12
    pub month: i16,
    /// Number of sales
    pub sales: i64,
    /// Sum of selling prices
    pub total_price: i64,
}

/// Result of `date_range_summary`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DateRangeSummary {
    /// Earliest sale in the window
    pub first_sale: Option<NaiveDate>,
    /// Latest sale in the window
    pub last_sale: Option<NaiveDate>,
    /// Number of sales
    pub sales: i64,
    /// Sum of selling prices
    pub total_price: i64,
    /// Mean selling price, absent when the window is empty
    pub average_price: Option<f64>,
}

/// Row of `top_makes`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MakeSales {
    /// Vehicle make
    pub make: String,
    /// Number of sales
    pub sales: i64,
    /// Mean selling price
    pub average_price: Option<f64>,
}

/// Everything the verifier found
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Row count per table, dimensions first
    pub table_counts: Vec<(&'static str, i64)>,
    /// Fact rows with a dangling foreign key
    pub orphaned_facts: i64,
    /// Revenue per state, highest first
    pub sales_by_state: Vec<StateSales>,
    /// Top sellers by revenue
    pub top_sellers: Vec<SellerSales>,
    /// Revenue per month, chronological
    pub sales_by_month: Vec<MonthSales>,
    /// Totals for the configured window
    pub date_range: DateRangeSummary,
    /// Top makes by sale count
    pub top_makes: Vec<MakeSales>,
}

impl VerificationReport {
    /// Row count of `table`, or 0 when it was not counted
    pub fn count(&self, table: &str) -> i64 {
        self.table_counts
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Run every verification query
pub async fn run(pool: &PgPool, config: &VerifyConfig) -> Result<VerificationReport> {
    let mut table_counts = Vec::with_capacity(Dimension::ALL.len() + 1);
    let tables = Dimension::ALL
        .iter()
        .map(|d| d.table())
        .chain(std::iter::once(FACT_TABLE));
    for table in tables {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("Failed to count rows in {table}"))?;
        table_counts.push((table, count));
    }

    let orphaned_facts: i64 = sqlx::query_scalar(ORPHANED_FACTS)
        .fetch_one(pool)
        .await
        .context("Failed to run orphaned_facts")?;
    if orphaned_facts > 0 {
        tracing::warn!("{} fact rows reference missing dimension rows", orphaned_facts);
    }

    let top_n = i64::from(config.top_n);

    let sales_by_state = sqlx::query_as::<_, StateSales>(SALES_BY_STATE)
        .fetch_all(pool)
        .await
        .context("Failed to run sales_by_state")?;

    let top_sellers = sqlx::query_as::<_, SellerSales>(TOP_SELLERS)
        .bind(top_n)
        .fetch_all(pool)
        .await
        .context("Failed to run top_sellers")?;

    let sales_by_month = sqlx::query_as::<_, MonthSales>(SALES_BY_MONTH)
        .fetch_all(pool)
        .await
        .context("Failed to run sales_by_month")?;

    let date_range = sqlx::query_as::<_, DateRangeSummary>(DATE_RANGE_SUMMARY)
        .bind(config.date_from)
        .bind(config.date_to)
        .fetch_one(pool)
        .await
        .context("Failed to run date_range_summary")?;

    let top_makes = sqlx::query_as::<_, MakeSales>(TOP_MAKES)
        .bind(top_n)
        .fetch_all(pool)
        .await
        .context("Failed to run top_makes")?;

    tracing::info!("Ran {} verification queries", queries().len() + 1);

    Ok(VerificationReport {
        table_counts,
        orphaned_facts,
        sales_by_state,
        top_sellers,
        sales_by_month,
        date_range,
        top_makes,
    })
}

fn format_price(value: f64) -> String {
    format!("{value:.2}")
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table counts")?;
        for (table, count) in &self.table_counts {
            writeln!(f, "  {table:<14} {count:>10}")?;
        }
        writeln!(f, "  orphaned facts {:>10}", self.orphaned_facts)?;

        writeln!(f)?;
        writeln!(f, "Sales by state")?;
        for row in &self.sales_by_state {
            writeln!(
                f,
                "  {:<3} {:<24} {:>8} {:>14}",
                row.state_code, row.state_name, row.sales, row.total_price
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Top sellers")?;
        for row in &self.top_sellers {
            writeln!(
                f,
                "  {:<40} {:>8} {:>14}",
                row.seller_name, row.sales, row.total_price
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Sales by month")?;
        for row in &self.sales_by_month {
            writeln!(
                f,
                "  {}-{:02} {:>8} {:>14}",
                row.year, row.month, row.sales, row.total_price
            )?;
        }

        writeln!(f)?;
        let range = &self.date_range;
        match (range.first_sale, range.last_sale) {
            (Some(first), Some(last)) => writeln!(f, "Date range {first} to {last}")?,
            _ => writeln!(f, "Date range (no sales)")?,
        }
        writeln!(f, "  sales          {:>10}", range.sales)?;
        writeln!(f, "  total price    {:>10}", range.total_price)?;
        writeln!(
            f,
            "  average price  {:>10}",
            range.average_price.map(format_price).unwrap_or_else(|| "-".into())
        )?;

        writeln!(f)?;
        writeln!(f, "Top makes")?;
        for row in &self.top_makes {
            writeln!(
                f,
                "  {:<20} {:>8} {:>12}",
                row.make,
                row.sales,
                row.average_price.map(format_price).unwrap_or_else(|| "-".into())
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_queries_are_read_only() {
        for (name, sql) in queries() {
            let upper = sql.to_uppercase();
            assert!(upper.trim_start().starts_with("SELECT"), "{name}");
            for keyword in ["INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE"] {
                assert!(!upper.contains(keyword), "{name} contains {keyword}");
            }
        }
    }

    #[rstest]
    #[case::top_sellers(TOP_SELLERS)]
    #[case::top_makes(TOP_MAKES)]
    fn test_ranked_queries_are_limited(#[case] sql: &str) {
        assert!(sql.ends_with("LIMIT $1"));
    }

    fn sample_report() -> VerificationReport {
        VerificationReport {
            table_counts: vec![("date_dim", 2), ("sales_fact", 5)],
            orphaned_facts: 0,
            sales_by_state: vec![StateSales {
                state_code: "CA".into(),
                state_name: "California".into(),
                sales: 2,
                total_price: 50_000,
            }],
            top_sellers: vec![],
            sales_by_month: vec![MonthSales {
                year: 2015,
                month: 1,
                sales: 5,
                total_price: 104_000,
            }],
            date_range: DateRangeSummary {
                first_sale: NaiveDate::from_ymd_opt(2015, 1, 6),
                last_sale: NaiveDate::from_ymd_opt(2015, 1, 7),
                sales: 5,
                total_price: 104_000,
                average_price: Some(20_800.0),
            },
            top_makes: vec![],
        }
    }

    #[test]
    fn test_report_display() {
        let text = sample_report().to_string();
        assert!(text.contains("California"));
        assert!(text.contains("2015-01"));
        assert!(text.contains("Date range 2015-01-06 to 2015-01-07"));
        assert!(text.contains("20800.00"));
    }

    #[test]
    fn test_report_count_lookup() {
        let report = sample_report();
        assert_eq!(report.count("sales_fact"), 5);
        assert_eq!(report.count("vehicle_dim"), 0);
    }
}
