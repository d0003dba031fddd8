//! Chart Payload Module
//! Serializable inputs for the map, hexagon layer, minute bar chart and
//! tables of the collision dashboard.

use crate::config::Selections;
use crate::data::{AffectedClass, Dataset, FilteredViews, Outcome, Record};
use crate::stats::{Aggregates, CategoryCount, CategoryField, GeoPoint, StreetMetric, StreetRanking};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// Initial camera of the 3D view
pub const INITIAL_ZOOM: u32 = 11;
pub const INITIAL_PITCH: u32 = 50;

// Hexagon layer parameters
pub const HEXAGON_RADIUS: u32 = 100;
pub const ELEVATION_SCALE: u32 = 4;
pub const ELEVATION_RANGE: [u32; 2] = [0, 1000];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u32,
    pub pitch: u32,
}

impl ViewState {
    pub fn centered_on(centroid: GeoPoint) -> Self {
        Self {
            latitude: centroid.latitude,
            longitude: centroid.longitude,
            zoom: INITIAL_ZOOM,
            pitch: INITIAL_PITCH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexagonLayer {
    pub radius: u32,
    pub elevation_scale: u32,
    pub elevation_range: [u32; 2],
    pub extruded: bool,
}

impl Default for HexagonLayer {
    fn default() -> Self {
        Self {
            radius: HEXAGON_RADIUS,
            elevation_scale: ELEVATION_SCALE,
            elevation_range: ELEVATION_RANGE,
            extruded: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedPoint {
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

/// Hexagon density layer over the hour-filtered view.
///
/// `view_state` is absent when the view is empty; there is nothing to frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityLayer {
    pub view_state: Option<ViewState>,
    pub layer: HexagonLayer,
    pub points: Vec<TimedPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub minute: u32,
    pub crashes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteChart {
    pub caption: String,
    pub bars: Vec<MinuteBar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingTable {
    pub class: AffectedClass,
    pub outcome: Outcome,
    pub column: String,
    pub rows: Vec<StreetRanking>,
}

impl RankingTable {
    fn new(metric: StreetMetric, rows: Vec<StreetRanking>) -> Self {
        Self {
            class: metric.class,
            outcome: metric.outcome,
            column: metric.column().to_string(),
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable {
    pub column: String,
    pub counts: Vec<CategoryCount>,
}

impl FrequencyTable {
    fn new(field: CategoryField, counts: Vec<CategoryCount>) -> Self {
        Self {
            column: field.column().to_string(),
            counts,
        }
    }
}

/// Everything a presentation layer needs to draw one render pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub selections: Selections,
    pub record_count: usize,
    pub hour_window: String,
    pub map_points: Vec<GeoPoint>,
    pub density_layer: DensityLayer,
    pub minute_chart: MinuteChart,
    pub injury_ranking: RankingTable,
    pub fatality_ranking: RankingTable,
    pub vehicle_types: FrequencyTable,
    pub contributing_factors: FrequencyTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_rows: Option<Vec<Record>>,
}

impl DashboardSnapshot {
    pub fn assemble(
        selections: &Selections,
        views: &FilteredViews,
        aggregates: Aggregates,
    ) -> Self {
        let bars = aggregates
            .histogram
            .buckets()
            .iter()
            .zip(0u32..)
            .map(|(&crashes, minute)| MinuteBar { minute, crashes })
            .collect();

        Self {
            selections: selections.clone(),
            record_count: views.original.len(),
            hour_window: hour_window(views.hour),
            map_points: geo_points(&views.map_points),
            density_layer: DensityLayer {
                view_state: aggregates.centroid.map(ViewState::centered_on),
                layer: HexagonLayer::default(),
                points: timed_points(&views.hour_filtered),
            },
            minute_chart: MinuteChart {
                caption: format!("Breakdown by minute between {}", hour_window(views.hour)),
                bars,
            },
            injury_ranking: RankingTable::new(aggregates.injury_metric, aggregates.injury_ranking),
            fatality_ranking: RankingTable::new(
                aggregates.fatality_metric,
                aggregates.fatality_ranking,
            ),
            vehicle_types: FrequencyTable::new(
                CategoryField::VehicleType,
                aggregates.vehicle_types,
            ),
            contributing_factors: FrequencyTable::new(
                CategoryField::ContributingFactor,
                aggregates.contributing_factors,
            ),
            raw_rows: selections
                .show_raw_data
                .then(|| views.hour_filtered.to_vec()),
        }
    }
}

/// "14:00 and 15:00"; the window after 23:00 wraps to 0:00.
pub fn hour_window(hour: u32) -> String {
    format!("{}:00 and {}:00", hour, (hour + 1) % 24)
}

fn geo_points(view: &Dataset) -> Vec<GeoPoint> {
    view.iter()
        .map(|r| GeoPoint {
            latitude: r.latitude,
            longitude: r.longitude,
        })
        .collect()
}

fn timed_points(view: &Dataset) -> Vec<TimedPoint> {
    view.iter()
        .map(|r| TimedPoint {
            timestamp: r.timestamp,
            latitude: r.latitude,
            longitude: r.longitude,
        })
        .collect()
}
