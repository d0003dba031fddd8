//! CSV Data Loader Module
//! Handles collision table loading with Polars, merges the accident date and
//! time columns, and memoizes parsed tables per source and row limit.

use crate::data::record::{columns, SchemaError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Rows sampled for column type inference.
const INFER_SCHEMA_ROWS: usize = 10000;

const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

/// Cell text read as missing in every column.
const MISSING_MARKERS: [&str; 10] = [
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "NULL", "null", "#N/A", "<NA>",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("No readable data source: '{}' does not exist or is not a file", .0.display())]
    SourceNotFound(PathBuf),
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A user-supplied table held in memory.
#[derive(Clone)]
pub struct Upload {
    name: String,
    bytes: Arc<[u8]>,
    digest: blake3::Hash,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into().into();
        let digest = blake3::hash(&bytes);
        Self {
            name: name.into(),
            bytes,
            digest,
        }
    }

    /// Read an upload from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoaderError::SourceNotFound(path.to_path_buf()),
            _ => LoaderError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Ok(Self::new(path.display().to_string(), bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("digest", &self.digest.to_hex().as_str())
            .finish()
    }
}

/// Where a table comes from. An upload takes precedence over the default file.
#[derive(Debug, Clone, Default)]
pub enum DataSource {
    #[default]
    Default,
    Upload(Upload),
}

impl DataSource {
    pub fn from_upload(upload: Option<Upload>) -> Self {
        upload.map_or(DataSource::Default, DataSource::Upload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SourceId {
    File(PathBuf),
    Upload { name: String, digest: [u8; 32] },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    source: SourceId,
    row_limit: usize,
}

/// A loaded table: the source columns with the accident date and time merged
/// into a single timestamp column.
#[derive(Debug, Clone)]
pub struct RawTable {
    frame: DataFrame,
}

impl RawTable {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Get list of column names.
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Process-lifetime memo of loaded tables, shared by handle.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: RwLock<HashMap<CacheKey, Arc<RawTable>>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<Arc<RawTable>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store a table unless another caller got there first; returns the cached one.
    fn insert(&self, key: CacheKey, table: RawTable) -> Arc<RawTable> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(table)))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads collision tables through a shared [`DatasetCache`].
#[derive(Debug, Clone)]
pub struct RecordLoader {
    default_path: PathBuf,
    cache: Arc<DatasetCache>,
}

impl RecordLoader {
    pub fn new(default_path: impl Into<PathBuf>, cache: Arc<DatasetCache>) -> Self {
        Self {
            default_path: default_path.into(),
            cache,
        }
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    pub fn cache(&self) -> &Arc<DatasetCache> {
        &self.cache
    }

    /// Load at most `row_limit` rows from `source`.
    ///
    /// Repeated calls with the same source and limit return the cached table
    /// without touching the source again.
    pub fn load(
        &self,
        source: &DataSource,
        row_limit: usize,
    ) -> Result<Arc<RawTable>, LoaderError> {
        let key = self.cache_key(source, row_limit);
        if let Some(table) = self.cache.get(&key) {
            debug!("Cache hit for {:?} (row limit {})", key.source, row_limit);
            return Ok(table);
        }
        debug!("Cache miss for {:?} (row limit {})", key.source, row_limit);

        let frame = match source {
            DataSource::Default => Self::read_csv_file(&self.default_path, row_limit)?,
            DataSource::Upload(upload) => Self::read_csv_bytes(upload, row_limit)?,
        };
        let table = merge_timestamp(&frame)?;

        info!(
            "Loaded {} rows, {} columns from {}",
            table.height(),
            table.frame().width(),
            match source {
                DataSource::Default => self.default_path.display().to_string(),
                DataSource::Upload(upload) => upload.name.clone(),
            }
        );

        Ok(self.cache.insert(key, table))
    }

    fn cache_key(&self, source: &DataSource, row_limit: usize) -> CacheKey {
        let source = match source {
            DataSource::Default => SourceId::File(self.default_path.clone()),
            DataSource::Upload(upload) => SourceId::Upload {
                name: upload.name.clone(),
                digest: *upload.digest.as_bytes(),
            },
        };
        CacheKey { source, row_limit }
    }

    fn read_csv_file(path: &Path, row_limit: usize) -> Result<DataFrame, LoaderError> {
        if !path.is_file() {
            return Err(LoaderError::SourceNotFound(path.to_path_buf()));
        }

        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .with_ignore_errors(true)
            .with_null_values(Some(missing_values()))
            .with_n_rows(Some(row_limit))
            .finish()?
            .collect()?;
        Ok(df)
    }

    fn read_csv_bytes(upload: &Upload, row_limit: usize) -> Result<DataFrame, LoaderError> {
        let cursor = Cursor::new(Arc::clone(&upload.bytes));
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .with_ignore_errors(true)
            .map_parse_options(|options| options.with_null_values(Some(missing_values())))
            .with_n_rows(Some(row_limit))
            .into_reader_with_file_handle(cursor)
            .finish()?;
        Ok(df)
    }
}

fn missing_values() -> NullValues {
    NullValues::AllColumns(MISSING_MARKERS.iter().map(|&marker| marker.into()).collect())
}

/// Find a column by name, ignoring ASCII case. Returns the name as spelled in the frame.
pub(crate) fn find_column(df: &DataFrame, wanted: &str) -> Result<String, SchemaError> {
    df.get_column_names()
        .into_iter()
        .find(|name| name.eq_ignore_ascii_case(wanted))
        .map(|name| name.to_string())
        .ok_or_else(|| SchemaError::MissingColumn(wanted.to_string()))
}

/// Replace the date and time columns with one millisecond timestamp column
/// named `<date>_<time>`, placed first.
fn merge_timestamp(df: &DataFrame) -> Result<RawTable, SchemaError> {
    let date_name = find_column(df, columns::ACCIDENT_DATE)?;
    let time_name = find_column(df, columns::ACCIDENT_TIME)?;

    let dates = df.column(&date_name)?.cast(&DataType::String)?;
    let times = df.column(&time_name)?.cast(&DataType::String)?;

    let mut millis: Vec<i64> = Vec::with_capacity(df.height());
    for (row, (date, time)) in dates.str()?.into_iter().zip(times.str()?).enumerate() {
        let stamp = parse_timestamp(date, time).ok_or_else(|| SchemaError::InvalidTimestamp {
            row,
            value: format!("{} {}", date.unwrap_or_default(), time.unwrap_or_default()),
        })?;
        millis.push(stamp.and_utc().timestamp_millis());
    }

    let merged = Column::new(format!("{date_name}_{time_name}").into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let mut merged_columns = vec![merged];
    merged_columns.extend(
        df.get_columns()
            .iter()
            .filter(|c| c.name().as_str() != date_name && c.name().as_str() != time_name)
            .cloned(),
    );

    Ok(RawTable::new(DataFrame::new(merged_columns)?))
}

/// Combine a date cell and a time cell into one timestamp.
///
/// Dates may carry an ISO `T...` suffix, which is ignored in favour of the
/// time cell.
fn parse_timestamp(date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = date?.trim();
    let date = date.split_once('T').map_or(date, |(day, _)| day);
    let time = time?.trim();

    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(time, format).ok())?;

    Some(date.and_time(time))
}
