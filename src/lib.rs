//! Collision Insights - Motor Vehicle Collision Data Pipeline
//!
//! Loads collision tables, filters them by hour of day and injury count, and
//! aggregates them into the inputs of a dashboard: map points, a hexagon
//! density layer, a per-minute histogram, street rankings and category counts.

pub mod charts;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod stats;

pub use charts::DashboardSnapshot;
pub use config::Selections;
pub use dashboard::{Dashboard, DashboardError};
pub use data::{DataSource, DatasetCache, RecordLoader, Upload};
