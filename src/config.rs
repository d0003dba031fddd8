//! Dashboard defaults and the widget selections of one render pass.

use crate::data::{AffectedClass, FilterError, RecordFilter};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_PATH: &str = "new.csv";
pub const DEFAULT_EXPORT_PATH: &str = "lat_long.csv";
pub const DEFAULT_ROW_LIMIT: usize = 2200;

/// Upper end of the injured-persons slider. The filter itself accepts any value.
pub const MAX_INJURED_SELECTION: u32 = 19;

/// Widget state driving one pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selections {
    pub row_limit: usize,
    pub min_injured: u32,
    pub hour: u32,
    pub injury_class: AffectedClass,
    pub fatality_class: AffectedClass,
    pub show_raw_data: bool,
}

impl Default for Selections {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            min_injured: 0,
            hour: 0,
            injury_class: AffectedClass::Pedestrians,
            fatality_class: AffectedClass::Pedestrians,
            show_raw_data: false,
        }
    }
}

impl Selections {
    pub fn validate(&self) -> Result<(), FilterError> {
        RecordFilter::check_hour(self.hour)
    }
}
