//! Collision Record Module
//! Typed collision records and the immutable dataset views built from them.

use chrono::{NaiveDateTime, Timelike};
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Canonical column identifiers.
///
/// Input headers are matched case-insensitively; after normalization every
/// column is addressed by its lowercase name.
pub mod columns {
    pub const ACCIDENT_DATE: &str = "ACCIDENT DATE";
    pub const ACCIDENT_TIME: &str = "ACCIDENT TIME";
    pub const TIMESTAMP: &str = "accident date_accident time";
    /// Position of the row in the loaded table, carried through normalization.
    pub const SOURCE_ROW: &str = "source_row";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const PERSONS_INJURED_SOURCE: &str = "number of persons injured";
    pub const PERSONS_INJURED: &str = "number_of_persons_injured";
    pub const PEDESTRIANS_INJURED: &str = "number of pedestrians injured";
    pub const CYCLISTS_INJURED: &str = "number of cyclist injured";
    pub const MOTORISTS_INJURED: &str = "number of motorist injured";
    pub const PEDESTRIANS_KILLED: &str = "number of pedestrians killed";
    pub const CYCLISTS_KILLED: &str = "number of cyclist killed";
    pub const MOTORISTS_KILLED: &str = "number of motorist killed";
    pub const ON_STREET_NAME: &str = "on street name";
    pub const VEHICLE_TYPE: &str = "vehicle type code 1";
    pub const CONTRIBUTING_FACTOR: &str = "contributing factor vehicle 1";
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Required column '{0}' is missing")]
    MissingColumn(String),
    #[error("Row {row}: cannot parse accident date/time from '{value}'")]
    InvalidTimestamp { row: usize, value: String },
    #[error("Row {row}: invalid value in column '{column}'")]
    InvalidValue { column: String, row: usize },
    #[error("Polars error: {0}")]
    Frame(#[from] PolarsError),
}

/// Road user class a casualty count refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AffectedClass {
    #[default]
    Pedestrians,
    Cyclists,
    Motorists,
}

/// Whether a casualty count tallies injuries or deaths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Injured,
    Killed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown affected class '{0}' (expected Pedestrians, Cyclists or Motorists)")]
pub struct ParseClassError(String);

impl AffectedClass {
    pub fn label(self) -> &'static str {
        match self {
            AffectedClass::Pedestrians => "Pedestrians",
            AffectedClass::Cyclists => "Cyclists",
            AffectedClass::Motorists => "Motorists",
        }
    }

    /// Canonical column holding this class's count for the given outcome.
    pub fn column(self, outcome: Outcome) -> &'static str {
        match (self, outcome) {
            (AffectedClass::Pedestrians, Outcome::Injured) => columns::PEDESTRIANS_INJURED,
            (AffectedClass::Cyclists, Outcome::Injured) => columns::CYCLISTS_INJURED,
            (AffectedClass::Motorists, Outcome::Injured) => columns::MOTORISTS_INJURED,
            (AffectedClass::Pedestrians, Outcome::Killed) => columns::PEDESTRIANS_KILLED,
            (AffectedClass::Cyclists, Outcome::Killed) => columns::CYCLISTS_KILLED,
            (AffectedClass::Motorists, Outcome::Killed) => columns::MOTORISTS_KILLED,
        }
    }
}

impl fmt::Display for AffectedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the dashboard's selection labels: "Cyclists", "cyclist",
/// "Motorists Killed", ...
impl FromStr for AffectedClass {
    type Err = ParseClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let class = lower
            .strip_suffix(" killed")
            .or_else(|| lower.strip_suffix(" injured"))
            .unwrap_or(&lower)
            .trim();

        match class {
            "pedestrian" | "pedestrians" => Ok(AffectedClass::Pedestrians),
            "cyclist" | "cyclists" => Ok(AffectedClass::Cyclists),
            "motorist" | "motorists" => Ok(AffectedClass::Motorists),
            _ => Err(ParseClassError(s.to_string())),
        }
    }
}

/// One collision event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub persons_injured: u32,
    pub pedestrians_injured: u32,
    pub cyclists_injured: u32,
    pub motorists_injured: u32,
    pub pedestrians_killed: u32,
    pub cyclists_killed: u32,
    pub motorists_killed: u32,
    pub on_street_name: Option<String>,
    pub vehicle_type_code_1: Option<String>,
    pub contributing_factor_vehicle_1: Option<String>,
}

impl Record {
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn minute(&self) -> u32 {
        self.timestamp.minute()
    }

    pub fn casualties(&self, class: AffectedClass, outcome: Outcome) -> u32 {
        match (class, outcome) {
            (AffectedClass::Pedestrians, Outcome::Injured) => self.pedestrians_injured,
            (AffectedClass::Cyclists, Outcome::Injured) => self.cyclists_injured,
            (AffectedClass::Motorists, Outcome::Injured) => self.motorists_injured,
            (AffectedClass::Pedestrians, Outcome::Killed) => self.pedestrians_killed,
            (AffectedClass::Cyclists, Outcome::Killed) => self.cyclists_killed,
            (AffectedClass::Motorists, Outcome::Killed) => self.motorists_killed,
        }
    }

    /// Street name, if present and not blank.
    pub fn street(&self) -> Option<&str> {
        self.on_street_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Immutable, ordered view over collision records.
///
/// Views derived with [`Dataset::retain`] share the record storage of their
/// parent and only carry their own row selection.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Arc<[Record]>,
    rows: Arc<[usize]>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        let rows = (0..records.len()).collect();
        Self {
            records: records.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.rows.get(index).map(|&row| &self.records[row])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.rows.iter().map(move |&row| &self.records[row])
    }

    /// Derive a new view holding the records that satisfy `keep`, in order.
    pub fn retain<F>(&self, keep: F) -> Dataset
    where
        F: Fn(&Record) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .copied()
            .filter(|&row| keep(&self.records[row]))
            .collect();
        Dataset {
            records: Arc::clone(&self.records),
            rows,
        }
    }

    pub fn to_vec(&self) -> Vec<Record> {
        self.iter().cloned().collect()
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
