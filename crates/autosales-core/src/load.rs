//! Loader: staged files into a warehouse sink
//!
//! Dimensions are loaded first. Each dimension file is deduplicated by
//! natural key and every unique row gets a dense surrogate key starting at 1.
//! Fact rows are then resolved against those keys. Resolution of the whole
//! fact file happens before the first fact batch is written, so an
//! unresolvable reference leaves the fact table empty.

use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{
    DateDim, Dimension, DimensionRecord, FACT_TABLE, Keyed, SaleRecord, SalesFact, SellerDim,
    StateDim, SurrogateKey, VehicleDim,
};
use crate::sink::WarehouseSink;
use crate::staging::{Line, StagedTables, read_records};

/// Natural key to surrogate key map of one dimension
#[derive(Debug, Clone)]
pub struct KeyMap<K> {
    keys: HashMap<K, SurrogateKey>,
}

impl<K: Eq + std::hash::Hash> KeyMap<K> {
    /// Surrogate key for `natural`, if loaded
    pub fn get(&self, natural: &K) -> Option<SurrogateKey> {
        self.keys.get(natural).copied()
    }
}

/// A dimension with surrogate keys assigned
pub struct KeyedDimension<T: DimensionRecord> {
    /// Unique rows in first-seen order
    pub rows: Vec<Keyed<T>>,
    /// Natural key lookup
    pub keys: KeyMap<T::Key>,
    /// Rows skipped because their natural key was already seen
    pub duplicates: u64,
}

/// Deduplicate `lines` by natural key and assign dense surrogate keys
pub fn assign_keys<T: DimensionRecord>(lines: Vec<Line<T>>) -> Result<KeyedDimension<T>> {
    let mut keys = HashMap::with_capacity(lines.len());
    let mut rows = Vec::with_capacity(lines.len());
    let mut duplicates = 0;

    for line in lines {
        let natural = line.record.natural_key();
        if keys.contains_key(&natural) {
            tracing::debug!(
                "{}: line {} repeats natural key '{}'",
                T::DIMENSION,
                line.number,
                natural
            );
            duplicates += 1;
            continue;
        }
        let key = SurrogateKey::try_from(rows.len() + 1).map_err(|_| Error::Sink {
            table: T::DIMENSION.table(),
            message: "surrogate key space exhausted".to_string(),
        })?;
        keys.insert(natural, key);
        rows.push(Keyed {
            key,
            row: line.record,
        });
    }

    Ok(KeyedDimension {
        rows,
        keys: KeyMap { keys },
        duplicates,
    })
}

/// Surrogate key lookups of all four dimensions
#[derive(Debug, Clone)]
pub struct DimensionKeys {
    /// Date keys
    pub dates: KeyMap<<DateDim as DimensionRecord>::Key>,
    /// State keys
    pub states: KeyMap<<StateDim as DimensionRecord>::Key>,
    /// Seller keys
    pub sellers: KeyMap<<SellerDim as DimensionRecord>::Key>,
    /// Vehicle keys
    pub vehicles: KeyMap<<VehicleDim as DimensionRecord>::Key>,
}

impl DimensionKeys {
    /// Resolve the natural keys of a staged sale into a fact row
    pub fn resolve(&self, sale_key: i64, line: &Line<SaleRecord>, path: &Path) -> Result<SalesFact> {
        let sale = &line.record;
        let unresolved = |dimension: Dimension, key: &dyn fmt::Display| Error::UnresolvedReference {
            path: path.display().to_string(),
            line: line.number,
            dimension,
            key: key.to_string(),
        };

        let date_key = self
            .dates
            .get(&sale.sale_date)
            .ok_or_else(|| unresolved(Dimension::Date, &sale.sale_date))?;
        let state_key = self
            .states
            .get(&sale.state_code)
            .ok_or_else(|| unresolved(Dimension::State, &sale.state_code))?;
        let seller_key = self
            .sellers
            .get(&sale.seller_name)
            .ok_or_else(|| unresolved(Dimension::Seller, &sale.seller_name))?;
        let vehicle = sale.vehicle_key();
        let vehicle_key = self
            .vehicles
            .get(&vehicle)
            .ok_or_else(|| unresolved(Dimension::Vehicle, &vehicle))?;

        Ok(SalesFact {
            sale_key,
            date_key,
            state_key,
            seller_key,
            vehicle_key,
            vin: sale.vin.clone(),
            body: sale.body.clone(),
            transmission: sale.transmission.clone(),
            color: sale.color.clone(),
            interior: sale.interior.clone(),
            condition: sale.condition,
            odometer: sale.odometer,
            mmr: sale.mmr,
            selling_price: sale.selling_price,
        })
    }
}

/// Output of the load stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Rows written per table
    pub rows: BTreeMap<&'static str, u64>,
    /// Staged dimension rows skipped as natural-key duplicates
    pub duplicate_dimension_rows: u64,
}

impl LoadSummary {
    /// Rows written to `table`
    pub fn rows_in(&self, table: &str) -> u64 {
        self.rows.get(table).copied().unwrap_or_default()
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (table, count) in &self.rows {
            writeln!(f, "  {table}: {count} rows")?;
        }
        if self.duplicate_dimension_rows > 0 {
            writeln!(
                f,
                "  duplicate dimension rows skipped: {}",
                self.duplicate_dimension_rows
            )?;
        }
        Ok(())
    }
}

/// Loads staged files into a [`WarehouseSink`], dimensions before facts
pub struct Loader<'a, S: ?Sized> {
    sink: &'a mut S,
    batch_size: usize,
}

impl<'a, S: WarehouseSink + ?Sized> Loader<'a, S> {
    /// Loader writing `batch_size` rows per sink call
    pub fn new(sink: &'a mut S, batch_size: usize) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
        }
    }

    /// Load every staged file
    pub async fn load(&mut self, staged: &StagedTables) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();

        let dates = read_dimension::<DateDim>(&staged.dimension(Dimension::Date))?;
        for chunk in dates.rows.chunks(self.batch_size) {
            self.sink.write_dates(chunk).await?;
        }
        record(&mut summary, &dates);

        let states = read_dimension::<StateDim>(&staged.dimension(Dimension::State))?;
        for chunk in states.rows.chunks(self.batch_size) {
            self.sink.write_states(chunk).await?;
        }
        record(&mut summary, &states);

        let sellers = read_dimension::<SellerDim>(&staged.dimension(Dimension::Seller))?;
        for chunk in sellers.rows.chunks(self.batch_size) {
            self.sink.write_sellers(chunk).await?;
        }
        record(&mut summary, &sellers);

        let vehicles = read_dimension::<VehicleDim>(&staged.dimension(Dimension::Vehicle))?;
        for chunk in vehicles.rows.chunks(self.batch_size) {
            self.sink.write_vehicles(chunk).await?;
        }
        record(&mut summary, &vehicles);

        let keys = DimensionKeys {
            dates: dates.keys,
            states: states.keys,
            sellers: sellers.keys,
            vehicles: vehicles.keys,
        };

        let path = staged.facts();
        let lines: Vec<Line<SaleRecord>> = read_records(&path)?;
        let facts = lines
            .iter()
            .enumerate()
            .map(|(idx, line)| keys.resolve(idx as i64 + 1, line, &path))
            .collect::<Result<Vec<_>>>()?;

        for chunk in facts.chunks(self.batch_size) {
            self.sink.write_sales(chunk).await?;
            tracing::debug!("Wrote {} rows to {}", chunk.len(), FACT_TABLE);
        }
        summary.rows.insert(FACT_TABLE, facts.len() as u64);
        tracing::info!("Loaded {} rows into {}", facts.len(), FACT_TABLE);

        Ok(summary)
    }
}

fn read_dimension<T>(path: &Path) -> Result<KeyedDimension<T>>
where
    T: DimensionRecord + DeserializeOwned,
{
    let keyed = assign_keys(read_records::<T>(path)?)?;
    tracing::debug!(
        "Assigned keys to {} {} rows",
        keyed.rows.len(),
        T::DIMENSION.table()
    );
    Ok(keyed)
}

fn record<T: DimensionRecord>(summary: &mut LoadSummary, dimension: &KeyedDimension<T>) {
    summary
        .rows
        .insert(T::DIMENSION.table(), dimension.rows.len() as u64);
    summary.duplicate_dimension_rows += dimension.duplicates;
    tracing::info!(
        "Loaded {} rows into {}",
        dimension.rows.len(),
        T::DIMENSION.table()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::staging::write_records;
    use chrono::NaiveDate;

    fn line<T>(number: u64, record: T) -> Line<T> {
        Line { number, record }
    }

    fn seller(name: &str) -> SellerDim {
        SellerDim {
            seller_name: name.to_string(),
        }
    }

    fn sale(date: (i32, u32, u32), state: &str, seller: &str, price: i64) -> SaleRecord {
        SaleRecord {
            sale_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            state_code: state.to_string(),
            seller_name: seller.to_string(),
            vehicle_year: 2015,
            make: "kia".to_string(),
            model: "sorento".to_string(),
            trim: "lx".to_string(),
            vin: None,
            body: None,
            transmission: None,
            color: None,
            interior: None,
            condition: None,
            odometer: None,
            mmr: None,
            selling_price: price,
        }
    }

    fn stage(dir: &Path, sales: &[SaleRecord]) -> StagedTables {
        let staged = StagedTables::new(dir);
        let mut dates: Vec<_> = sales.iter().map(|s| DateDim::from_date(s.sale_date)).collect();
        dates.dedup();
        write_records(&staged.dimension(Dimension::Date), &dates).unwrap();
        let states: Vec<_> = ["CA", "TX"]
            .iter()
            .map(|c| StateDim {
                state_code: c.to_string(),
                state_name: c.to_string(),
            })
            .collect();
        write_records(&staged.dimension(Dimension::State), &states).unwrap();
        write_records(
            &staged.dimension(Dimension::Seller),
            [seller("acme"), seller("globex")],
        )
        .unwrap();
        write_records(
            &staged.dimension(Dimension::Vehicle),
            [VehicleDim {
                year: 2015,
                make: "kia".to_string(),
                model: "sorento".to_string(),
                trim: "lx".to_string(),
            }],
        )
        .unwrap();
        write_records(&staged.facts(), sales).unwrap();
        staged
    }

    #[test]
    fn test_assign_keys_dedups_by_natural_key() {
        let keyed = assign_keys(vec![
            line(2, seller("acme")),
            line(3, seller("globex")),
            line(4, seller("acme")),
        ])
        .unwrap();

        assert_eq!(keyed.rows.len(), 2);
        assert_eq!(keyed.duplicates, 1);
        assert_eq!(keyed.rows[0].key, 1);
        assert_eq!(keyed.rows[1].key, 2);
        assert_eq!(keyed.keys.get(&"globex".to_string()), Some(2));
        assert_eq!(keyed.keys.get(&"initech".to_string()), None);
    }

    #[tokio::test]
    async fn test_load_two_dates_two_states() {
        let dir = tempfile::tempdir().unwrap();
        let sales = vec![
            sale((2015, 1, 6), "CA", "acme", 10_000),
            sale((2015, 1, 6), "TX", "globex", 12_000),
            sale((2015, 1, 7), "CA", "globex", 9_000),
        ];
        let staged = stage(dir.path(), &sales);

        let mut sink = MemorySink::new();
        let summary = Loader::new(&mut sink, 2).load(&staged).await.unwrap();

        assert_eq!(summary.rows_in("date_dim"), 2);
        assert_eq!(summary.rows_in("state_dim"), 2);
        assert_eq!(summary.rows_in("sales_fact"), 3);
        assert_eq!(sink.row_counts(), summary.rows);
        assert!(sink.violations().is_empty());

        let fact = &sink.sales[1];
        assert_eq!(fact.sale_key, 2);
        let state = sink.states.iter().find(|s| s.key == fact.state_key).unwrap();
        assert_eq!(state.row.state_code, "TX");
        let seller = sink.sellers.iter().find(|s| s.key == fact.seller_key).unwrap();
        assert_eq!(seller.row.seller_name, "globex");
        let date = sink.dates.iter().find(|d| d.key == sink.sales[2].date_key).unwrap();
        assert_eq!(date.row.day, 7);
    }

    #[tokio::test]
    async fn test_load_fails_on_unresolved_reference() {
        let dir = tempfile::tempdir().unwrap();
        let sales = vec![
            sale((2015, 1, 6), "CA", "acme", 10_000),
            sale((2015, 1, 6), "CA", "initech", 12_000),
        ];
        let staged = stage(dir.path(), &sales);

        let mut sink = MemorySink::new();
        let err = Loader::new(&mut sink, 100).load(&staged).await.unwrap_err();

        match err {
            Error::UnresolvedReference {
                line,
                dimension,
                key,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(dimension, Dimension::Seller);
                assert_eq!(key, "initech");
            }
            other => panic!("Expected unresolved reference, got {other:?}"),
        }
        // Dimensions went in; no fact row did.
        assert_eq!(sink.sellers.len(), 2);
        assert!(sink.sales.is_empty());
    }
}
