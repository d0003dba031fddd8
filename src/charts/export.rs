//! Coordinate Export
//! Writes the latitude/longitude pairs of a view to an auxiliary CSV file.

use crate::data::{columns, Dataset};
use log::info;
use polars::prelude::*;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to create '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write CSV: {0}")]
    CsvError(#[from] PolarsError),
}

pub struct CoordinateExporter;

impl CoordinateExporter {
    /// Two-column frame of the view's coordinates, in view order.
    pub fn to_frame(view: &Dataset) -> PolarsResult<DataFrame> {
        let latitudes: Vec<f64> = view.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<f64> = view.iter().map(|r| r.longitude).collect();

        DataFrame::new(vec![
            Column::new(columns::LATITUDE.into(), latitudes),
            Column::new(columns::LONGITUDE.into(), longitudes),
        ])
    }

    /// Write the coordinates with a header row; returns the number of data rows.
    pub fn write_csv<W: Write>(view: &Dataset, writer: &mut W) -> Result<usize, ExportError> {
        let mut df = Self::to_frame(view)?;
        CsvWriter::new(writer).include_header(true).finish(&mut df)?;
        Ok(df.height())
    }

    pub fn write_file(view: &Dataset, path: &Path) -> Result<usize, ExportError> {
        let mut file = File::create(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rows = Self::write_csv(view, &mut file)?;
        info!("Exported {} coordinates to {}", rows, path.display());
        Ok(rows)
    }
}
