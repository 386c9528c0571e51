//! Star-schema model
//!
//! Four dimensions (date, state, seller, vehicle) and one fact table. The
//! staged CSV files carry natural keys only; surrogate keys are assigned by
//! the [`Loader`](crate::load::Loader) when rows are written to a sink.
//!
//! ```text
//!   date_dim ──┐
//!  state_dim ──┤
//! seller_dim ──┼──▶ sales_fact
//! vehicle_dim ─┘
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Surrogate key of a dimension row
pub type SurrogateKey = i32;

/// The four dimensions of the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Calendar date of the sale
    Date,
    /// U.S. state the sale was registered in
    State,
    /// Selling party
    Seller,
    /// Vehicle model year/make/model/trim
    Vehicle,
}

impl Dimension {
    /// All dimensions, in load order
    pub const ALL: [Dimension; 4] = [
        Dimension::Date,
        Dimension::State,
        Dimension::Seller,
        Dimension::Vehicle,
    ];

    /// Table name in the warehouse
    pub fn table(self) -> &'static str {
        match self {
            Dimension::Date => "date_dim",
            Dimension::State => "state_dim",
            Dimension::Seller => "seller_dim",
            Dimension::Vehicle => "vehicle_dim",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Fact table name
pub const FACT_TABLE: &str = "sales_fact";

/// A dimension record identified by a natural key
pub trait DimensionRecord: Clone {
    /// Natural key used for deduplication and fact resolution
    type Key: Clone + Eq + Hash + Ord + fmt::Display;

    /// Which dimension this record belongs to
    const DIMENSION: Dimension;

    /// Natural key of this record
    fn natural_key(&self) -> Self::Key;
}

/// A record paired with its assigned surrogate key
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<T> {
    /// Surrogate key
    pub key: SurrogateKey,
    /// The record
    pub row: T,
}

/// One row of `date_dim`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateDim {
    /// Sale date (natural key)
    pub sale_date: NaiveDate,
    /// Calendar year
    pub year: i32,
    /// Quarter, 1-4
    pub quarter: u32,
    /// Month, 1-12
    pub month: u32,
    /// Day of month, 1-31
    pub day: u32,
    /// ISO weekday, Monday = 1
    pub weekday: u32,
}

impl DateDim {
    /// Derive calendar fields from a date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            sale_date: date,
            year: date.year(),
            quarter: (date.month() - 1) / 3 + 1,
            month: date.month(),
            day: date.day(),
            weekday: date.weekday().number_from_monday(),
        }
    }
}

impl DimensionRecord for DateDim {
    type Key = NaiveDate;
    const DIMENSION: Dimension = Dimension::Date;

    fn natural_key(&self) -> NaiveDate {
        self.sale_date
    }
}

/// One row of `state_dim`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDim {
    /// Two-letter upper-case code (natural key)
    pub state_code: String,
    /// Full state name
    pub state_name: String,
}

impl DimensionRecord for StateDim {
    type Key = String;
    const DIMENSION: Dimension = Dimension::State;

    fn natural_key(&self) -> String {
        self.state_code.clone()
    }
}

/// One row of `seller_dim`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerDim {
    /// Normalized seller name (natural key)
    pub seller_name: String,
}

impl DimensionRecord for SellerDim {
    type Key = String;
    const DIMENSION: Dimension = Dimension::Seller;

    fn natural_key(&self) -> String {
        self.seller_name.clone()
    }
}

/// One row of `vehicle_dim`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDim {
    /// Model year
    pub year: i32,
    /// Manufacturer
    pub make: String,
    /// Model name
    pub model: String,
    /// Trim level (may be empty)
    pub trim: String,
}

/// Natural key of a vehicle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleKey {
    /// Model year
    pub year: i32,
    /// Manufacturer
    pub make: String,
    /// Model name
    pub model: String,
    /// Trim level
    pub trim: String,
}

impl fmt::Display for VehicleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.year, self.make, self.model, self.trim)
    }
}

impl DimensionRecord for VehicleDim {
    type Key = VehicleKey;
    const DIMENSION: Dimension = Dimension::Vehicle;

    fn natural_key(&self) -> VehicleKey {
        VehicleKey {
            year: self.year,
            make: self.make.clone(),
            model: self.model.clone(),
            trim: self.trim.clone(),
        }
    }
}

/// One staged sale: natural keys plus degenerate attributes and measures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Date of sale
    pub sale_date: NaiveDate,
    /// State code
    pub state_code: String,
    /// Normalized seller name
    pub seller_name: String,
    /// Vehicle model year
    pub vehicle_year: i32,
    /// Vehicle make
    pub make: String,
    /// Vehicle model
    pub model: String,
    /// Vehicle trim
    pub trim: String,
    /// Vehicle identification number
    pub vin: Option<String>,
    /// Body style
    pub body: Option<String>,
    /// Transmission type
    pub transmission: Option<String>,
    /// Exterior color
    pub color: Option<String>,
    /// Interior color
    pub interior: Option<String>,
    /// Condition grade
    pub condition: Option<f64>,
    /// Odometer reading in miles
    pub odometer: Option<i64>,
    /// Manheim market report value
    pub mmr: Option<i64>,
    /// Selling price in whole dollars
    pub selling_price: i64,
}

impl SaleRecord {
    /// Vehicle natural key
    pub fn vehicle_key(&self) -> VehicleKey {
        VehicleKey {
            year: self.vehicle_year,
            make: self.make.clone(),
            model: self.model.clone(),
            trim: self.trim.clone(),
        }
    }
}

/// One row of `sales_fact`, with resolved surrogate keys
#[derive(Debug, Clone, PartialEq)]
pub struct SalesFact {
    /// Sale key, dense from 1 in staged order
    pub sale_key: i64,
    /// Reference into `date_dim`
    pub date_key: SurrogateKey,
    /// Reference into `state_dim`
    pub state_key: SurrogateKey,
    /// Reference into `seller_dim`
    pub seller_key: SurrogateKey,
    /// Reference into `vehicle_dim`
    pub vehicle_key: SurrogateKey,
    /// Vehicle identification number
    pub vin: Option<String>,
    /// Body style
    pub body: Option<String>,
    /// Transmission type
    pub transmission: Option<String>,
    /// Exterior color
    pub color: Option<String>,
    /// Interior color
    pub interior: Option<String>,
    /// Condition grade
    pub condition: Option<f64>,
    /// Odometer reading
    pub odometer: Option<i64>,
    /// Market report value
    pub mmr: Option<i64>,
    /// Selling price
    pub selling_price: i64,
}
