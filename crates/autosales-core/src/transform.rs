//! Transformer: raw sales CSV to staged star-schema files
//!
//! Each raw row is normalized (trimmed, whitespace collapsed, lower-cased
//! names, upper-case state codes) and either rejected with a
//! [`RejectReason`] or staged as a [`SaleRecord`]. Dimension files are
//! deduplicated by natural key and written in key order, so the loader's
//! surrogate keys are stable across runs over the same input.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{DateDim, Dimension, DimensionRecord, SaleRecord, SellerDim, StateDim, VehicleDim};
use crate::staging::{StagedTables, write_records};
use crate::states;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]").expect("valid regex"));
/// `Tue Dec 16 2014 12:30:00 GMT-0800 (PST)`
static SALE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{3}\s+([A-Za-z]{3})\s+(\d{1,2})\s+(\d{4})\b").expect("valid regex")
});

/// Highest selling price accepted, in dollars
pub const MAX_SELLING_PRICE: i64 = 10_000_000;

/// Raw columns the transformer reads
pub const RAW_COLUMNS: [&str; 16] = [
    "year",
    "make",
    "model",
    "trim",
    "body",
    "transmission",
    "vin",
    "state",
    "condition",
    "odometer",
    "color",
    "interior",
    "seller",
    "mmr",
    "sellingprice",
    "saledate",
];

/// Why a raw row was not staged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectReason {
    /// Sale date missing or not parseable
    InvalidSaleDate,
    /// State code not in the U.S. state table
    UnknownState,
    /// Model year missing or out of range
    InvalidYear,
    /// Make or model missing
    MissingVehicle,
    /// Seller missing
    MissingSeller,
    /// Selling price missing, negative, not numeric or above
    /// [`MAX_SELLING_PRICE`]
    InvalidPrice,
    /// Row is not valid UTF-8
    InvalidEncoding,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::InvalidSaleDate => "invalid sale date",
            RejectReason::UnknownState => "unknown state",
            RejectReason::InvalidYear => "invalid model year",
            RejectReason::MissingVehicle => "missing make/model",
            RejectReason::MissingSeller => "missing seller",
            RejectReason::InvalidPrice => "invalid selling price",
            RejectReason::InvalidEncoding => "invalid UTF-8",
        };
        f.write_str(s)
    }
}

/// Output of the transform stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformReport {
    /// Raw data rows read
    pub rows_read: u64,
    /// Fact rows staged
    pub rows_staged: u64,
    /// Rejected rows by reason
    pub rejected: BTreeMap<RejectReason, u64>,
    /// Distinct rows staged per dimension
    pub dimension_rows: BTreeMap<&'static str, u64>,
    /// Groups of distinct seller names that only differ in punctuation or spacing
    pub near_duplicate_sellers: Vec<Vec<String>>,
}

impl TransformReport {
    /// Total rejected rows
    pub fn rows_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }

    /// Distinct rows staged for `dimension`
    pub fn distinct(&self, dimension: Dimension) -> u64 {
        self.dimension_rows
            .get(dimension.table())
            .copied()
            .unwrap_or_default()
    }
}

impl fmt::Display for TransformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "rows read: {}, staged: {}, rejected: {}",
            self.rows_read,
            self.rows_staged,
            self.rows_rejected()
        )?;
        for (reason, count) in &self.rejected {
            writeln!(f, "  rejected ({reason}): {count}")?;
        }
        for (table, count) in &self.dimension_rows {
            writeln!(f, "  {table}: {count} rows")?;
        }
        if !self.near_duplicate_sellers.is_empty() {
            writeln!(
                f,
                "  near-duplicate seller groups (not merged): {}",
                self.near_duplicate_sellers.len()
            )?;
        }
        Ok(())
    }
}

/// Column positions of the raw file
struct RawColumns([usize; RAW_COLUMNS.len()]);

impl RawColumns {
    fn locate(headers: &csv::StringRecord, path: &Path) -> Result<Self> {
        let mut idx = [0; RAW_COLUMNS.len()];
        for (slot, name) in idx.iter_mut().zip(RAW_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::MissingColumn {
                    path: path.display().to_string(),
                    column: name.to_string(),
                })?;
        }
        Ok(Self(idx))
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: &str) -> &'r str {
        RAW_COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|i| record.get(self.0[i]))
            .unwrap_or("")
    }
}

/// Accumulated dimensions, keyed by natural key
#[derive(Default)]
struct Dimensions {
    dates: BTreeMap<NaiveDate, DateDim>,
    states: BTreeMap<String, StateDim>,
    sellers: BTreeMap<String, SellerDim>,
    vehicles: BTreeMap<<VehicleDim as DimensionRecord>::Key, VehicleDim>,
}

impl Dimensions {
    fn observe(&mut self, sale: &SaleRecord, state_name: &str) {
        self.dates
            .entry(sale.sale_date)
            .or_insert_with(|| DateDim::from_date(sale.sale_date));
        self.states
            .entry(sale.state_code.clone())
            .or_insert_with(|| StateDim {
                state_code: sale.state_code.clone(),
                state_name: state_name.to_string(),
            });
        self.sellers
            .entry(sale.seller_name.clone())
            .or_insert_with(|| SellerDim {
                seller_name: sale.seller_name.clone(),
            });
        self.vehicles
            .entry(sale.vehicle_key())
            .or_insert_with(|| VehicleDim {
                year: sale.vehicle_year,
                make: sale.make.clone(),
                model: sale.model.clone(),
                trim: sale.trim.clone(),
            });
    }
}

/// Transform the raw CSV at `raw_csv` into staged files
pub fn transform(raw_csv: &Path, staged: &StagedTables) -> Result<TransformReport> {
    std::fs::create_dir_all(staged.dir())?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(raw_csv)?;
    let columns = RawColumns::locate(reader.headers()?, raw_csv)?;

    let mut facts = csv::Writer::from_path(staged.facts())?;
    let mut dims = Dimensions::default();
    let mut report = TransformReport::default();

    for row in reader.byte_records() {
        let row = row?;
        report.rows_read += 1;
        let parsed = csv::StringRecord::from_byte_record(row)
            .map_err(|_| RejectReason::InvalidEncoding)
            .and_then(|row| parse_row(&columns, &row));
        match parsed {
            Ok((sale, state_name)) => {
                dims.observe(&sale, state_name);
                facts.serialize(&sale)?;
                report.rows_staged += 1;
            }
            Err(reason) => {
                *report.rejected.entry(reason).or_default() += 1;
            }
        }
    }
    facts.flush()?;

    report.near_duplicate_sellers = near_duplicates(dims.sellers.keys());
    for group in &report.near_duplicate_sellers {
        tracing::warn!("Seller names differ only in punctuation/spacing: {:?}", group);
    }

    let counts = [
        (
            Dimension::Date,
            write_records(&staged.dimension(Dimension::Date), dims.dates.values())?,
        ),
        (
            Dimension::State,
            write_records(&staged.dimension(Dimension::State), dims.states.values())?,
        ),
        (
            Dimension::Seller,
            write_records(&staged.dimension(Dimension::Seller), dims.sellers.values())?,
        ),
        (
            Dimension::Vehicle,
            write_records(&staged.dimension(Dimension::Vehicle), dims.vehicles.values())?,
        ),
    ];
    for (dimension, count) in counts {
        report.dimension_rows.insert(dimension.table(), count);
    }

    if report.rows_rejected() > 0 {
        tracing::warn!(
            "Rejected {} of {} raw rows",
            report.rows_rejected(),
            report.rows_read
        );
    }
    tracing::info!(
        "Staged {} sales into {}",
        report.rows_staged,
        staged.dir().display()
    );
    Ok(report)
}

fn parse_row(
    columns: &RawColumns,
    row: &csv::StringRecord,
) -> std::result::Result<(SaleRecord, &'static str), RejectReason> {
    let field = |name: &str| columns.get(row, name);

    let sale_date = parse_sale_date(field("saledate")).ok_or(RejectReason::InvalidSaleDate)?;
    let (state_code, state_name) =
        states::lookup(field("state")).ok_or(RejectReason::UnknownState)?;
    let vehicle_year = field("year")
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|y| (1900..=2100).contains(y))
        .ok_or(RejectReason::InvalidYear)?;
    let make = required(field("make")).ok_or(RejectReason::MissingVehicle)?;
    let model = required(field("model")).ok_or(RejectReason::MissingVehicle)?;
    let seller_name = required(field("seller")).ok_or(RejectReason::MissingSeller)?;
    let selling_price = parse_amount(field("sellingprice"))
        .filter(|p| (0..=MAX_SELLING_PRICE).contains(p))
        .ok_or(RejectReason::InvalidPrice)?;

    let sale = SaleRecord {
        sale_date,
        state_code: state_code.to_string(),
        seller_name,
        vehicle_year,
        make,
        model,
        trim: normalize_name(field("trim")),
        vin: required(field("vin")),
        body: required(field("body")),
        transmission: required(field("transmission")),
        color: required(field("color")).filter(|c| c != "—"),
        interior: required(field("interior")).filter(|c| c != "—"),
        condition: field("condition")
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|c| c.is_finite()),
        odometer: parse_amount(field("odometer")),
        mmr: parse_amount(field("mmr")),
        selling_price,
    };
    Ok((sale, state_name))
}

/// Trim, collapse internal whitespace and lower-case
pub fn normalize_name(value: &str) -> String {
    WHITESPACE
        .replace_all(value.trim(), " ")
        .to_lowercase()
}

fn required(value: &str) -> Option<String> {
    let normalized = normalize_name(value);
    (!normalized.is_empty()).then_some(normalized)
}

/// Parse a whole-dollar or whole-mile amount, tolerating a fractional part
///
/// Values that do not fit in an `i64` are `None`.
fn parse_amount(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    value
        .parse::<f64>()
        .ok()
        .map(f64::round)
        .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
}

/// Parse a sale date in the dataset's JavaScript-style format, or ISO 8601
pub fn parse_sale_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(caps) = SALE_DATE.captures(value) {
        let text = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        return NaiveDate::parse_from_str(&text, "%b %d %Y").ok();
    }
    NaiveDate::parse_from_str(value.get(..10).unwrap_or(value), "%Y-%m-%d").ok()
}

/// Group names that are identical once punctuation and spacing are removed
fn near_duplicates<'a>(names: impl Iterator<Item = &'a String>) -> Vec<Vec<String>> {
    let mut groups: HashMap<String, BTreeSet<&'a String>> = HashMap::new();
    for name in names {
        let fingerprint = NON_ALNUM.replace_all(name, "").into_owned();
        groups.entry(fingerprint).or_default().insert(name);
    }
    let mut out: Vec<Vec<String>> = groups
        .into_values()
        .filter(|g| g.len() > 1)
        .map(|g| g.into_iter().cloned().collect())
        .collect();
    out.sort();
    out
}
