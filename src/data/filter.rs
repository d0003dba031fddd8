//! Record Filter Module
//! Injury-threshold and hour-of-day predicates over dataset views.

use crate::data::record::Dataset;
use log::debug;
use thiserror::Error;

pub const HOURS_PER_DAY: u32 = 24;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    #[error("Hour {0} is outside 0..=23")]
    HourOutOfRange(u32),
}

/// The views one render pass works with.
#[derive(Debug, Clone)]
pub struct FilteredViews {
    /// Records at or above the injured-persons threshold; feeds the map.
    pub map_points: Dataset,
    /// Normalized records before any hour restriction; feeds street rankings.
    pub original: Dataset,
    /// Records whose timestamp falls in the selected hour.
    pub hour_filtered: Dataset,
    pub hour: u32,
}

/// Applies the dashboard's record predicates.
pub struct RecordFilter;

impl RecordFilter {
    /// Keep records with at least `threshold` persons injured.
    pub fn by_min_injured(dataset: &Dataset, threshold: u32) -> Dataset {
        dataset.retain(|r| r.persons_injured >= threshold)
    }

    /// Keep records whose timestamp hour equals `hour`.
    pub fn by_hour(dataset: &Dataset, hour: u32) -> Result<Dataset, FilterError> {
        Self::check_hour(hour)?;
        Ok(dataset.retain(|r| r.hour() == hour))
    }

    pub fn check_hour(hour: u32) -> Result<(), FilterError> {
        if hour < HOURS_PER_DAY {
            Ok(())
        } else {
            Err(FilterError::HourOutOfRange(hour))
        }
    }

    /// Derive the map, original and hour-filtered views from normalized data.
    ///
    /// The injured threshold only shapes the map view; the hour view and the
    /// original view are both taken from the unthresholded data.
    pub fn split_views(
        normalized: &Dataset,
        min_injured: u32,
        hour: u32,
    ) -> Result<FilteredViews, FilterError> {
        let hour_filtered = Self::by_hour(normalized, hour)?;
        let map_points = Self::by_min_injured(normalized, min_injured);

        debug!(
            "Views: {} records, {} with >= {} injured, {} in hour {}",
            normalized.len(),
            map_points.len(),
            min_injured,
            hour_filtered.len(),
            hour
        );

        Ok(FilteredViews {
            map_points,
            original: normalized.clone(),
            hour_filtered,
            hour,
        })
    }
}
