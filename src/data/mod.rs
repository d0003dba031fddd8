//! Data module - CSV loading, normalization and filtering

mod filter;
mod loader;
mod processor;
mod record;

pub use filter::{FilterError, FilteredViews, RecordFilter, HOURS_PER_DAY};
pub use loader::{DataSource, DatasetCache, LoaderError, RawTable, RecordLoader, Upload};
pub use processor::Normalizer;
pub use record::{columns, AffectedClass, Dataset, Outcome, ParseClassError, Record, SchemaError};

#[cfg(test)]
pub(crate) use record::tests::record as test_record;
