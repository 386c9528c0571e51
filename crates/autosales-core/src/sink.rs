//! Warehouse sink trait and in-memory implementation
//!
//! The [`Loader`](crate::load::Loader) writes keyed rows through a
//! [`WarehouseSink`]. The PostgreSQL sink lives in `autosales-warehouse`;
//! [`MemorySink`] backs dry runs and tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::error::Result;
use crate::model::{
    DateDim, Dimension, DimensionRecord, FACT_TABLE, Keyed, SalesFact, SellerDim, StateDim,
    SurrogateKey, VehicleDim,
};

/// Destination for keyed dimension rows and resolved fact rows
#[async_trait]
pub trait WarehouseSink: Send {
    /// Insert a batch of `date_dim` rows
    async fn write_dates(&mut self, rows: &[Keyed<DateDim>]) -> Result<()>;

    /// Insert a batch of `state_dim` rows
    async fn write_states(&mut self, rows: &[Keyed<StateDim>]) -> Result<()>;

    /// Insert a batch of `seller_dim` rows
    async fn write_sellers(&mut self, rows: &[Keyed<SellerDim>]) -> Result<()>;

    /// Insert a batch of `vehicle_dim` rows
    async fn write_vehicles(&mut self, rows: &[Keyed<VehicleDim>]) -> Result<()>;

    /// Insert a batch of `sales_fact` rows
    async fn write_sales(&mut self, rows: &[SalesFact]) -> Result<()>;
}

/// A referential-integrity problem found in a [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Two rows of a dimension share a surrogate key
    DuplicateKey {
        /// Dimension table
        dimension: Dimension,
        /// Repeated surrogate key
        key: SurrogateKey,
    },
    /// Two rows of a dimension share a natural key
    DuplicateNaturalKey {
        /// Dimension table
        dimension: Dimension,
        /// Repeated natural key
        natural_key: String,
    },
    /// A fact row references a missing dimension row
    DanglingReference {
        /// Sale key of the fact row
        sale_key: i64,
        /// Referenced dimension
        dimension: Dimension,
        /// Missing surrogate key
        key: SurrogateKey,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateKey { dimension, key } => {
                write!(f, "{dimension}: surrogate key {key} appears more than once")
            }
            Violation::DuplicateNaturalKey {
                dimension,
                natural_key,
            } => write!(f, "{dimension}: natural key '{natural_key}' appears more than once"),
            Violation::DanglingReference {
                sale_key,
                dimension,
                key,
            } => write!(f, "{FACT_TABLE} row {sale_key}: no {dimension} row with key {key}"),
        }
    }
}

/// Sink that keeps every row in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// `date_dim` rows
    pub dates: Vec<Keyed<DateDim>>,
    /// `state_dim` rows
    pub states: Vec<Keyed<StateDim>>,
    /// `seller_dim` rows
    pub sellers: Vec<Keyed<SellerDim>>,
    /// `vehicle_dim` rows
    pub vehicles: Vec<Keyed<VehicleDim>>,
    /// `sales_fact` rows
    pub sales: Vec<SalesFact>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Row count of every table, keyed by table name
    pub fn row_counts(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            (Dimension::Date.table(), self.dates.len() as u64),
            (Dimension::State.table(), self.states.len() as u64),
            (Dimension::Seller.table(), self.sellers.len() as u64),
            (Dimension::Vehicle.table(), self.vehicles.len() as u64),
            (FACT_TABLE, self.sales.len() as u64),
        ])
    }

    /// Check key uniqueness in every dimension and that each fact reference
    /// resolves to exactly one dimension row
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        let dates = check_dimension(&self.dates, &mut out);
        let states = check_dimension(&self.states, &mut out);
        let sellers = check_dimension(&self.sellers, &mut out);
        let vehicles = check_dimension(&self.vehicles, &mut out);

        for sale in &self.sales {
            let refs = [
                (Dimension::Date, sale.date_key, &dates),
                (Dimension::State, sale.state_key, &states),
                (Dimension::Seller, sale.seller_key, &sellers),
                (Dimension::Vehicle, sale.vehicle_key, &vehicles),
            ];
            for (dimension, key, known) in refs {
                if !known.contains(&key) {
                    out.push(Violation::DanglingReference {
                        sale_key: sale.sale_key,
                        dimension,
                        key,
                    });
                }
            }
        }
        out
    }
}

fn check_dimension<T: DimensionRecord>(
    rows: &[Keyed<T>],
    out: &mut Vec<Violation>,
) -> HashSet<SurrogateKey> {
    let mut keys = HashSet::new();
    let mut natural: HashMap<T::Key, usize> = HashMap::new();
    for row in rows {
        if !keys.insert(row.key) {
            out.push(Violation::DuplicateKey {
                dimension: T::DIMENSION,
                key: row.key,
            });
        }
        *natural.entry(row.row.natural_key()).or_default() += 1;
    }
    let mut repeated: Vec<_> = natural.into_iter().filter(|(_, n)| *n > 1).collect();
    repeated.sort_by(|a, b| a.0.cmp(&b.0));
    out.extend(repeated.into_iter().map(|(k, _)| Violation::DuplicateNaturalKey {
        dimension: T::DIMENSION,
        natural_key: k.to_string(),
    }));
    keys
}

#[async_trait]
impl WarehouseSink for MemorySink {
    async fn write_dates(&mut self, rows: &[Keyed<DateDim>]) -> Result<()> {
        self.dates.extend_from_slice(rows);
        Ok(())
    }

    async fn write_states(&mut self, rows: &[Keyed<StateDim>]) -> Result<()> {
        self.states.extend_from_slice(rows);
        Ok(())
    }

    async fn write_sellers(&mut self, rows: &[Keyed<SellerDim>]) -> Result<()> {
        self.sellers.extend_from_slice(rows);
        Ok(())
    }

    async fn write_vehicles(&mut self, rows: &[Keyed<VehicleDim>]) -> Result<()> {
        self.vehicles.extend_from_slice(rows);
        Ok(())
    }

    async fn write_sales(&mut self, rows: &[SalesFact]) -> Result<()> {
        self.sales.extend_from_slice(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller(key: SurrogateKey, name: &str) -> Keyed<SellerDim> {
        Keyed {
            key,
            row: SellerDim {
                seller_name: name.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_memory_sink_collects_rows() {
        let mut sink = MemorySink::new();
        sink.write_sellers(&[seller(1, "acme")]).await.unwrap();
        sink.write_sellers(&[seller(2, "globex")]).await.unwrap();

        let counts = sink.row_counts();
        assert_eq!(counts["seller_dim"], 2);
        assert_eq!(counts["sales_fact"], 0);
        assert!(sink.violations().is_empty());
    }

    #[test]
    fn test_violations_detect_duplicates() {
        let sink = MemorySink {
            sellers: vec![seller(1, "acme"), seller(1, "globex"), seller(2, "acme")],
            ..Default::default()
        };
        let violations = sink.violations();
        assert_eq!(
            violations,
            vec![
                Violation::DuplicateKey {
                    dimension: Dimension::Seller,
                    key: 1
                },
                Violation::DuplicateNaturalKey {
                    dimension: Dimension::Seller,
                    natural_key: "acme".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_violations_detect_dangling_reference() {
        let sink = MemorySink {
            sellers: vec![seller(1, "acme")],
            sales: vec![SalesFact {
                sale_key: 1,
                date_key: 1,
                state_key: 1,
                seller_key: 1,
                vehicle_key: 1,
                vin: None,
                body: None,
                transmission: None,
                color: None,
                interior: None,
                condition: None,
                odometer: None,
                mmr: None,
                selling_price: 100,
            }],
            ..Default::default()
        };
        let violations = sink.violations();
        // date, state and vehicle are empty; seller resolves
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().all(|v| matches!(
            v,
            Violation::DanglingReference { sale_key: 1, .. }
        )));
        assert_eq!(
            violations[0].to_string(),
            "sales_fact row 1: no date_dim row with key 1"
        );
    }
}
