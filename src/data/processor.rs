//! Data Processor Module
//! Normalizes loaded tables and validates them into typed collision records.

use crate::data::loader::RawTable;
use crate::data::record::{columns, Dataset, Record, SchemaError};
use chrono::{DateTime, NaiveDateTime};
use log::debug;
use polars::prelude::*;

/// Handles column normalization and typed record extraction.
pub struct Normalizer;

impl Normalizer {
    /// Normalize a loaded table and validate it into a [`Dataset`].
    pub fn normalize(raw: &RawTable) -> Result<Dataset, SchemaError> {
        let frame = Self::normalize_frame(raw)?;
        Self::to_dataset(&frame)
    }

    /// Lowercase column names, rename the total-injury column, and drop rows
    /// lacking a coordinate.
    ///
    /// Pure and idempotent: the input is left untouched and normalizing an
    /// already normalized table yields an equal table. Each row keeps its
    /// position in the loaded table in [`columns::SOURCE_ROW`].
    pub fn normalize_frame(raw: &RawTable) -> Result<RawTable, SchemaError> {
        let mut df = raw.frame().clone();

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| canonical_name(name))
            .collect();
        df.set_column_names(names.iter().map(String::as_str))?;

        if df.column(columns::SOURCE_ROW).is_err() {
            df = df.with_row_index(columns::SOURCE_ROW.into(), None)?;
        }

        let rows = source_rows(&df)?;
        for name in [columns::LATITUDE, columns::LONGITUDE] {
            let values = required(&df, name)?;
            check_cast(values, &values.cast(&DataType::Float64)?, name, &rows)?;
        }

        let before = df.height();
        let df = df
            .lazy()
            .with_columns([
                col(columns::LATITUDE).cast(DataType::Float64),
                col(columns::LONGITUDE).cast(DataType::Float64),
            ])
            .filter(
                col(columns::LATITUDE)
                    .is_not_null()
                    .and(col(columns::LONGITUDE).is_not_null())
                    .and(col(columns::LATITUDE).is_not_nan())
                    .and(col(columns::LONGITUDE).is_not_nan()),
            )
            .collect()?;

        debug!(
            "Dropped {} of {} rows without coordinates",
            before - df.height(),
            before
        );
        Ok(RawTable::new(df))
    }

    /// Build typed records from a normalized table, checking the schema once.
    pub fn to_dataset(table: &RawTable) -> Result<Dataset, SchemaError> {
        let df = table.frame();
        let rows = source_rows(df)?;

        let timestamps = timestamp_column(df)?;
        let latitudes = float_column(df, columns::LATITUDE)?;
        let longitudes = float_column(df, columns::LONGITUDE)?;
        let persons_injured = count_column(df, columns::PERSONS_INJURED, &rows)?;
        let pedestrians_injured = count_column(df, columns::PEDESTRIANS_INJURED, &rows)?;
        let cyclists_injured = count_column(df, columns::CYCLISTS_INJURED, &rows)?;
        let motorists_injured = count_column(df, columns::MOTORISTS_INJURED, &rows)?;
        let pedestrians_killed = count_column(df, columns::PEDESTRIANS_KILLED, &rows)?;
        let cyclists_killed = count_column(df, columns::CYCLISTS_KILLED, &rows)?;
        let motorists_killed = count_column(df, columns::MOTORISTS_KILLED, &rows)?;
        let mut streets = text_column(df, columns::ON_STREET_NAME)?.into_iter();
        let mut vehicle_types = text_column(df, columns::VEHICLE_TYPE)?.into_iter();
        let mut factors = text_column(df, columns::CONTRIBUTING_FACTOR)?.into_iter();

        let mut records = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let invalid = |column: &str| invalid_value(column, &rows, row);

            records.push(Record {
                timestamp: timestamps[row].ok_or_else(|| invalid(columns::TIMESTAMP))?,
                latitude: latitudes[row].ok_or_else(|| invalid(columns::LATITUDE))?,
                longitude: longitudes[row].ok_or_else(|| invalid(columns::LONGITUDE))?,
                persons_injured: persons_injured[row],
                pedestrians_injured: pedestrians_injured[row],
                cyclists_injured: cyclists_injured[row],
                motorists_injured: motorists_injured[row],
                pedestrians_killed: pedestrians_killed[row],
                cyclists_killed: cyclists_killed[row],
                motorists_killed: motorists_killed[row],
                on_street_name: streets.next().flatten(),
                vehicle_type_code_1: vehicle_types.next().flatten(),
                contributing_factor_vehicle_1: factors.next().flatten(),
            });
        }

        Ok(Dataset::new(records))
    }
}

/// Lowercase a header and map the total-injury header to its canonical name.
fn canonical_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower == columns::PERSONS_INJURED_SOURCE {
        columns::PERSONS_INJURED.to_string()
    } else {
        lower
    }
}

fn required<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, SchemaError> {
    df.column(name)
        .map_err(|_| SchemaError::MissingColumn(name.to_string()))
}

/// Loaded-table position of every frame row; frame order when untracked.
fn source_rows(df: &DataFrame) -> Result<Vec<usize>, SchemaError> {
    let Ok(index) = df.column(columns::SOURCE_ROW) else {
        return Ok((0..df.height()).collect());
    };

    let index = index.cast(&DataType::UInt64)?;
    let rows = index
        .u64()?
        .into_iter()
        .enumerate()
        .map(|(i, row)| row.map_or(i, |r| r as usize))
        .collect();
    Ok(rows)
}

fn invalid_value(column: &str, rows: &[usize], row: usize) -> SchemaError {
    SchemaError::InvalidValue {
        column: column.to_string(),
        row: rows.get(row).copied().unwrap_or(row),
    }
}

/// Fail on the first cell that held a value before the cast and none after it.
fn check_cast(
    source: &Column,
    cast: &Column,
    name: &str,
    rows: &[usize],
) -> Result<(), SchemaError> {
    if cast.null_count() == source.null_count() {
        return Ok(());
    }

    let before = source.is_null();
    let after = cast.is_null();
    let lost = before
        .into_iter()
        .zip(after.into_iter())
        .position(|(was_null, is_null)| was_null == Some(false) && is_null == Some(true));

    match lost {
        Some(row) => Err(invalid_value(name, rows, row)),
        None => Ok(()),
    }
}

fn timestamp_column(df: &DataFrame) -> Result<Vec<Option<NaiveDateTime>>, SchemaError> {
    let millis = required(df, columns::TIMESTAMP)?.cast(&DataType::Int64)?;
    Ok(millis
        .i64()?
        .into_iter()
        .map(|ms| ms.and_then(DateTime::from_timestamp_millis).map(|dt| dt.naive_utc()))
        .collect())
}

/// Finite floats; anything else reads as absent.
fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, SchemaError> {
    let values = required(df, name)?.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()))
        .collect())
}

/// Whole, non-negative counts; empty cells read as zero.
fn count_column(df: &DataFrame, name: &str, rows: &[usize]) -> Result<Vec<u32>, SchemaError> {
    let source = required(df, name)?;
    let values = source.cast(&DataType::Float64)?;
    check_cast(source, &values, name, rows)?;

    values
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            None => Ok(0),
            Some(v) if is_count(v) => Ok(v as u32),
            Some(_) => Err(invalid_value(name, rows, row)),
        })
        .collect()
}

fn is_count(value: f64) -> bool {
    value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value)
}

/// Trimmed text; empty cells read as absent.
fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, SchemaError> {
    let values = required(df, name)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{DataSource, DatasetCache, RecordLoader, Upload};
    use std::sync::Arc;

    const HEADER: &str = "ACCIDENT DATE,ACCIDENT TIME,LATITUDE,LONGITUDE,\
NUMBER OF PERSONS INJURED,NUMBER OF PEDESTRIANS INJURED,NUMBER OF CYCLIST INJURED,\
NUMBER OF MOTORIST INJURED,NUMBER OF PEDESTRIANS KILLED,NUMBER OF CYCLIST KILLED,\
NUMBER OF MOTORIST KILLED,ON STREET NAME,VEHICLE TYPE CODE 1,CONTRIBUTING FACTOR VEHICLE 1";

    fn load(rows: &[&str]) -> Arc<RawTable> {
        let csv = format!("{HEADER}\n{}\n", rows.join("\n"));
        RecordLoader::new("unused.csv", Arc::new(DatasetCache::new()))
            .load(&DataSource::Upload(Upload::new("test.csv", csv)), 100)
            .unwrap()
    }

    fn sample() -> Arc<RawTable> {
        load(&[
            "07/14/2022,14:05,40.7,-73.9,3,2,1,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,15:10,,-73.95,1,1,0,0,0,0,0,ATLANTIC AVENUE,Taxi,Unspecified",
            "07/14/2022,16:20,40.72,,0,0,0,0,0,0,0,,Sedan,",
            "07/15/2022,9:30,40.65,-73.94,,0,0,0,0,0,1,  ,Bike,Unsafe Speed",
        ])
    }

    fn invalid_cell(err: SchemaError) -> (String, usize) {
        match err {
            SchemaError::InvalidValue { column, row } => (column, row),
            other => panic!("expected an invalid value, got {other}"),
        }
    }

    #[test]
    fn lowercases_and_renames_columns() {
        let frame = Normalizer::normalize_frame(&sample()).unwrap();
        let names = frame.column_names();

        assert!(names.contains(&"number_of_persons_injured".to_string()));
        assert!(names.contains(&"accident date_accident time".to_string()));
        assert!(names.iter().all(|n| n.to_lowercase() == *n));
        assert!(!names.contains(&"number of persons injured".to_string()));
    }

    #[test]
    fn drops_rows_missing_either_coordinate() {
        let raw = sample();
        let frame = Normalizer::normalize_frame(&raw).unwrap();

        assert_eq!(raw.height(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.frame().column("latitude").unwrap().null_count(), 0);
        assert_eq!(frame.frame().column("longitude").unwrap().null_count(), 0);
    }

    #[test]
    fn drops_rows_with_nan_coordinates() {
        let df = DataFrame::new(vec![
            Column::new("LATITUDE".into(), vec![f64::NAN, 40.7, 40.8]),
            Column::new("LONGITUDE".into(), vec![-73.9, -73.9, f64::NAN]),
        ])
        .unwrap();

        let frame = Normalizer::normalize_frame(&RawTable::new(df)).unwrap();
        let latitudes: Vec<Option<f64>> =
            frame.frame().column("latitude").unwrap().f64().unwrap().into_iter().collect();

        assert_eq!(latitudes, vec![Some(40.7)]);
    }

    #[test]
    fn missing_coordinate_markers_drop_the_row() {
        let raw = load(&[
            "07/14/2022,14:05,NaN,-73.9,1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,14:06,40.7,N/A,1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,14:07,40.71,-73.91,1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
        ]);

        let dataset = Normalizer::normalize(&raw).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.get(0).map(|r| r.latitude), Some(40.71));
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = Normalizer::normalize_frame(&sample()).unwrap();
        let twice = Normalizer::normalize_frame(&once).unwrap();

        assert_eq!(once.column_names(), twice.column_names());
        assert!(once.frame().equals_missing(twice.frame()));
        assert_eq!(
            Normalizer::to_dataset(&once).unwrap(),
            Normalizer::to_dataset(&twice).unwrap()
        );
    }

    #[test]
    fn builds_typed_records() {
        let dataset = Normalizer::normalize(&sample()).unwrap();
        assert_eq!(dataset.len(), 2);

        let first = dataset.get(0).unwrap();
        assert_eq!(first.hour(), 14);
        assert_eq!(first.minute(), 5);
        assert_eq!(first.persons_injured, 3);
        assert_eq!(first.pedestrians_injured, 2);
        assert_eq!(first.cyclists_injured, 1);
        assert_eq!(first.street(), Some("BROADWAY"));
        assert_eq!(first.vehicle_type_code_1.as_deref(), Some("Sedan"));

        let second = dataset.get(1).unwrap();
        assert_eq!(second.persons_injured, 0);
        assert_eq!(second.motorists_killed, 1);
        assert_eq!(second.on_street_name, None);
    }

    #[test]
    fn negative_count_is_schema_error() {
        let raw = load(&["07/14/2022,14:05,40.7,-73.9,-1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified"]);
        let err = Normalizer::normalize(&raw).unwrap_err();

        assert_eq!(
            invalid_cell(err),
            ("number_of_persons_injured".to_string(), 0)
        );
    }

    #[test]
    fn non_numeric_count_is_schema_error() {
        let raw = load(&[
            "07/14/2022,14:05,40.7,-73.9,many,lots,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,14:06,40.71,-73.91,2,1,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
        ]);
        let err = Normalizer::normalize(&raw).unwrap_err();

        assert_eq!(
            invalid_cell(err),
            ("number_of_persons_injured".to_string(), 0)
        );
    }

    #[test]
    fn fractional_count_is_schema_error() {
        let raw = load(&[
            "07/14/2022,14:05,40.7,-73.9,2,1,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,14:06,40.71,-73.91,2,1.5,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
        ]);
        let err = Normalizer::normalize(&raw).unwrap_err();

        assert_eq!(
            invalid_cell(err),
            ("number of pedestrians injured".to_string(), 1)
        );
    }

    #[test]
    fn non_numeric_coordinate_is_schema_error() {
        let raw = load(&[
            "07/14/2022,14:05,40.7,-73.9,1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,14:06,north,-73.91,1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
        ]);
        let err = Normalizer::normalize_frame(&raw).unwrap_err();

        assert_eq!(invalid_cell(err), ("latitude".to_string(), 1));
    }

    #[test]
    fn errors_name_the_loaded_row() {
        let raw = load(&[
            "07/14/2022,14:05,,-73.9,1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,14:06,40.7,,1,0,0,0,0,0,0,BROADWAY,Sedan,Unspecified",
            "07/14/2022,14:07,40.71,-73.91,1,0,-3,0,0,0,0,BROADWAY,Sedan,Unspecified",
        ]);
        let err = Normalizer::normalize(&raw).unwrap_err();

        assert_eq!(
            invalid_cell(err),
            ("number of cyclist injured".to_string(), 2)
        );
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let csv = "ACCIDENT DATE,ACCIDENT TIME,LATITUDE,LONGITUDE\n07/14/2022,14:05,40.7,-73.9\n";
        let raw = RecordLoader::new("unused.csv", Arc::new(DatasetCache::new()))
            .load(&DataSource::Upload(Upload::new("short.csv", csv)), 100)
            .unwrap();

        let err = Normalizer::normalize(&raw).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MissingColumn(ref c) if c == "number_of_persons_injured"
        ));
    }
}
