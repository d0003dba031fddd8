//! Charts module - Presentation inputs and the coordinate export

mod export;
mod payload;

pub use export::{CoordinateExporter, ExportError};
pub use payload::{
    hour_window, DashboardSnapshot, DensityLayer, FrequencyTable, HexagonLayer, MinuteBar,
    MinuteChart, RankingTable, TimedPoint, ViewState,
};
