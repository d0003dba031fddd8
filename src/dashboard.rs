//! Collision Dashboard Pipeline
//! Runs one render pass: load, normalize, export, filter, aggregate.

use crate::charts::{CoordinateExporter, DashboardSnapshot, ExportError};
use crate::config::Selections;
use crate::data::{
    DataSource, FilterError, LoaderError, Normalizer, RecordFilter, RecordLoader, SchemaError,
};
use crate::stats::CollisionStats;
use log::{info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Loading failed: {0}")]
    Load(#[from] LoaderError),
    #[error("Invalid collision table: {0}")]
    Schema(#[from] SchemaError),
    #[error("Invalid selection: {0}")]
    Filter(#[from] FilterError),
    #[error("Coordinate export failed: {0}")]
    Export(#[from] ExportError),
}

/// The pipeline behind the dashboard. Cheap to share; tables are cached by
/// the loader.
#[derive(Debug, Clone)]
pub struct Dashboard {
    loader: RecordLoader,
    export_path: Option<PathBuf>,
}

impl Dashboard {
    pub fn new(loader: RecordLoader) -> Self {
        Self {
            loader,
            export_path: None,
        }
    }

    /// Also write the loaded coordinates to `path` on every render pass.
    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    pub fn loader(&self) -> &RecordLoader {
        &self.loader
    }

    pub fn export_path(&self) -> Option<&Path> {
        self.export_path.as_deref()
    }

    /// Produce the snapshot for `selections`.
    ///
    /// Load and schema failures abort the pass; nothing partial is returned.
    pub fn render(
        &self,
        source: &DataSource,
        selections: &Selections,
    ) -> Result<DashboardSnapshot, DashboardError> {
        selections.validate()?;

        let raw = self.loader.load(source, selections.row_limit)?;
        let data = Normalizer::normalize(&raw)?;

        if let Some(path) = &self.export_path {
            CoordinateExporter::write_file(&data, path)?;
        }

        let views = RecordFilter::split_views(&data, selections.min_injured, selections.hour)?;
        if views.hour_filtered.is_empty() {
            warn!("No collisions recorded in hour {}", selections.hour);
        }

        let aggregates = CollisionStats::compute_all_parallel(
            &views,
            selections.injury_class,
            selections.fatality_class,
        );

        info!(
            "Rendered {} collisions: {} on map, {} in hour {}",
            data.len(),
            views.map_points.len(),
            views.hour_filtered.len(),
            selections.hour
        );

        Ok(DashboardSnapshot::assemble(selections, &views, aggregates))
    }
}
