//! Statistics Calculator Module
//! Read-only aggregations over dataset views: centroid, minute histogram,
//! street rankings and category frequencies.

use crate::data::{columns, AffectedClass, Dataset, FilteredViews, Outcome};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;

pub const MINUTES_PER_HOUR: usize = 60;

/// Rows kept by an injury ranking.
pub const INJURY_RANKING_LIMIT: usize = 5;
/// Rows kept by a fatality ranking.
pub const FATALITY_RANKING_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Collision counts per minute of one hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteHistogram {
    buckets: [u32; MINUTES_PER_HOUR],
}

impl Default for MinuteHistogram {
    fn default() -> Self {
        Self {
            buckets: [0; MINUTES_PER_HOUR],
        }
    }
}

impl MinuteHistogram {
    pub fn buckets(&self) -> &[u32; MINUTES_PER_HOUR] {
        &self.buckets
    }

    pub fn total(&self) -> u32 {
        self.buckets.iter().sum()
    }
}

/// The casualty column a street ranking sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreetMetric {
    pub class: AffectedClass,
    pub outcome: Outcome,
}

impl StreetMetric {
    pub fn injured(class: AffectedClass) -> Self {
        Self {
            class,
            outcome: Outcome::Injured,
        }
    }

    pub fn killed(class: AffectedClass) -> Self {
        Self {
            class,
            outcome: Outcome::Killed,
        }
    }

    pub fn column(&self) -> &'static str {
        self.class.column(self.outcome)
    }

    pub fn limit(&self) -> usize {
        match self.outcome {
            Outcome::Injured => INJURY_RANKING_LIMIT,
            Outcome::Killed => FATALITY_RANKING_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetRanking {
    pub street: String,
    pub value: u32,
}

/// Categorical field counted by [`CollisionStats::category_counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    VehicleType,
    ContributingFactor,
}

impl CategoryField {
    pub fn column(self) -> &'static str {
        match self {
            CategoryField::VehicleType => columns::VEHICLE_TYPE,
            CategoryField::ContributingFactor => columns::CONTRIBUTING_FACTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
}

/// Everything the aggregation stage produces for one render pass.
#[derive(Debug, Clone)]
pub struct Aggregates {
    pub centroid: Option<GeoPoint>,
    pub histogram: MinuteHistogram,
    pub injury_metric: StreetMetric,
    pub injury_ranking: Vec<StreetRanking>,
    pub fatality_metric: StreetMetric,
    pub fatality_ranking: Vec<StreetRanking>,
    pub vehicle_types: Vec<CategoryCount>,
    pub contributing_factors: Vec<CategoryCount>,
}

/// Handles aggregations with multi-threading support.
pub struct CollisionStats;

impl CollisionStats {
    /// Mean latitude and longitude; `None` for an empty view.
    pub fn centroid(view: &Dataset) -> Option<GeoPoint> {
        if view.is_empty() {
            return None;
        }

        Some(GeoPoint {
            latitude: view.iter().map(|r| r.latitude).mean(),
            longitude: view.iter().map(|r| r.longitude).mean(),
        })
    }

    /// Count records in `hour` by minute into 60 zero-filled buckets.
    pub fn minute_histogram(view: &Dataset, hour: u32) -> MinuteHistogram {
        let mut histogram = MinuteHistogram::default();
        for record in view.iter().filter(|r| r.hour() == hour) {
            histogram.buckets[record.minute() as usize] += 1;
        }
        histogram
    }

    /// Streets with the highest casualty count for `metric`.
    ///
    /// Rows need a non-blank street and a count of at least one. Sorting is
    /// stable, so equal counts keep their original order.
    pub fn top_streets(original: &Dataset, metric: StreetMetric) -> Vec<StreetRanking> {
        let mut rows: Vec<StreetRanking> = original
            .iter()
            .filter_map(|r| {
                let value = r.casualties(metric.class, metric.outcome);
                let street = r.street()?;
                (value >= 1).then(|| StreetRanking {
                    street: street.to_string(),
                    value,
                })
            })
            .collect();

        rows.sort_by(|a, b| b.value.cmp(&a.value));
        rows.truncate(metric.limit());
        rows
    }

    /// Frequency of each distinct value, most frequent first.
    ///
    /// Ties keep first-appearance order; absent values are not counted.
    pub fn category_counts(view: &Dataset, field: CategoryField) -> Vec<CategoryCount> {
        let mut counts: Vec<CategoryCount> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for record in view.iter() {
            let value = match field {
                CategoryField::VehicleType => &record.vehicle_type_code_1,
                CategoryField::ContributingFactor => &record.contributing_factor_vehicle_1,
            }
            .as_deref();
            let Some(value) = value else {
                continue;
            };

            let next = counts.len();
            let i = *positions.entry(value).or_insert(next);
            if i == next {
                counts.push(CategoryCount {
                    value: value.to_string(),
                    count: 0,
                });
            }
            counts[i].count += 1;
        }

        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts
    }

    /// Compute every aggregate of a render pass in parallel.
    pub fn compute_all_parallel(
        views: &FilteredViews,
        injury_class: AffectedClass,
        fatality_class: AffectedClass,
    ) -> Aggregates {
        let injury_metric = StreetMetric::injured(injury_class);
        let fatality_metric = StreetMetric::killed(fatality_class);

        let hour_view = &views.hour_filtered;

        // Use rayon for parallel computation
        let (timing, (rankings, categories)) = rayon::join(
            || {
                (
                    Self::centroid(hour_view),
                    Self::minute_histogram(hour_view, views.hour),
                )
            },
            || {
                rayon::join(
                    || {
                        rayon::join(
                            || Self::top_streets(&views.original, injury_metric),
                            || Self::top_streets(&views.original, fatality_metric),
                        )
                    },
                    || {
                        rayon::join(
                            || Self::category_counts(hour_view, CategoryField::VehicleType),
                            || Self::category_counts(hour_view, CategoryField::ContributingFactor),
                        )
                    },
                )
            },
        );
        let (centroid, histogram) = timing;
        let (injury_ranking, fatality_ranking) = rankings;
        let (vehicle_types, contributing_factors) = categories;

        Aggregates {
            centroid,
            histogram,
            injury_metric,
            injury_ranking,
            fatality_metric,
            fatality_ranking,
            vehicle_types,
            contributing_factors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{test_record, Record, RecordFilter};

    const PEDESTRIANS: AffectedClass = AffectedClass::Pedestrians;

    fn pedestrians(street: &str, injured: u32) -> Record {
        Record {
            pedestrians_injured: injured,
            ..test_record("2022-07-14 14:05", Some(street))
        }
    }

    fn categorized(stamp: &str, vehicle: Option<&str>, factor: Option<&str>) -> Record {
        Record {
            vehicle_type_code_1: vehicle.map(str::to_string),
            contributing_factor_vehicle_1: factor.map(str::to_string),
            ..test_record(stamp, None)
        }
    }

    #[test]
    fn ranking_keeps_ties_in_original_order() {
        let data: Dataset = vec![
            pedestrians("A", 3),
            pedestrians("B", 3),
            pedestrians("C", 1),
        ]
        .into_iter()
        .collect();

        let ranking = CollisionStats::top_streets(&data, StreetMetric::injured(PEDESTRIANS));
        let streets: Vec<(&str, u32)> = ranking
            .iter()
            .map(|r| (r.street.as_str(), r.value))
            .collect();

        assert_eq!(streets, vec![("A", 3), ("B", 3), ("C", 1)]);
    }

    #[test]
    fn ranking_skips_blank_streets_and_zero_counts() {
        let data: Dataset = vec![
            pedestrians("  ", 9),
            pedestrians("ZERO ST", 0),
            Record {
                pedestrians_injured: 4,
                ..test_record("2022-07-14 14:05", None)
            },
            pedestrians("KEPT AVE", 2),
        ]
        .into_iter()
        .collect();

        let ranking = CollisionStats::top_streets(&data, StreetMetric::injured(PEDESTRIANS));
        assert_eq!(
            ranking,
            vec![StreetRanking {
                street: "KEPT AVE".to_string(),
                value: 2
            }]
        );
    }

    #[test]
    fn ranking_limits_depend_on_outcome() {
        let data: Dataset = (1..=12)
            .map(|i| Record {
                pedestrians_injured: i,
                pedestrians_killed: i,
                ..test_record("2022-07-14 14:05", Some(format!("STREET {i}").as_str()))
            })
            .collect();

        let injured = CollisionStats::top_streets(&data, StreetMetric::injured(PEDESTRIANS));
        let killed = CollisionStats::top_streets(&data, StreetMetric::killed(PEDESTRIANS));

        assert_eq!(injured.len(), 5);
        assert_eq!(killed.len(), 10);
        assert_eq!(injured[0].value, 12);
        assert!(killed.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn histogram_counts_minutes_of_selected_hour() {
        let data: Dataset = [
            "2022-07-14 14:05",
            "2022-07-14 14:05",
            "2022-07-15 14:05",
            "2022-07-16 14:05",
            "2022-07-14 14:59",
            "2022-07-14 15:05",
        ]
        .iter()
        .map(|stamp| test_record(stamp, None))
        .collect();

        let histogram = CollisionStats::minute_histogram(&data, 14);
        let buckets = histogram.buckets();

        assert_eq!(buckets[5], 4);
        assert_eq!(buckets[59], 1);
        assert_eq!(buckets.iter().filter(|&&b| b == 0).count(), 58);
        assert_eq!(histogram.total(), 5);
    }

    #[test]
    fn histogram_total_matches_hour_view() {
        let data: Dataset = (0..24u32)
            .flat_map(|h| (0..60u32).step_by(7).map(move |m| (h, m)))
            .map(|(h, m)| test_record(&format!("2022-07-14 {h:02}:{m:02}"), None))
            .collect();

        for hour in [0, 9, 23] {
            let view = RecordFilter::by_hour(&data, hour).unwrap();
            let histogram = CollisionStats::minute_histogram(&view, hour);
            assert_eq!(histogram.total() as usize, view.len());
        }
    }

    #[test]
    fn centroid_is_mean_of_coordinates() {
        let data: Dataset = [(40.0, -74.0), (41.0, -73.0)]
            .iter()
            .map(|&(latitude, longitude)| Record {
                latitude,
                longitude,
                ..test_record("2022-07-14 14:05", None)
            })
            .collect();

        let centroid = CollisionStats::centroid(&data).unwrap();
        assert!((centroid.latitude - 40.5).abs() < 1e-12);
        assert!((centroid.longitude + 73.5).abs() < 1e-12);
        assert_eq!(CollisionStats::centroid(&Dataset::default()), None);
    }

    #[test]
    fn category_counts_sorted_by_frequency() {
        let data: Dataset = vec![
            categorized("2022-07-14 14:05", Some("Taxi"), Some("Unspecified")),
            categorized("2022-07-14 14:06", Some("Sedan"), None),
            categorized("2022-07-14 14:07", Some("Bike"), Some("Unsafe Speed")),
            categorized("2022-07-14 14:08", Some("Sedan"), Some("Unspecified")),
            categorized("2022-07-14 14:09", None, Some("Unspecified")),
        ]
        .into_iter()
        .collect();

        let vehicles: Vec<(String, usize)> =
            CollisionStats::category_counts(&data, CategoryField::VehicleType)
                .into_iter()
                .map(|c| (c.value, c.count))
                .collect();
        assert_eq!(
            vehicles,
            vec![
                ("Sedan".to_string(), 2),
                ("Taxi".to_string(), 1),
                ("Bike".to_string(), 1)
            ]
        );

        let factors = CollisionStats::category_counts(&data, CategoryField::ContributingFactor);
        assert_eq!(factors[0].value, "Unspecified");
        assert_eq!(factors[0].count, 3);
        assert_eq!(factors.len(), 2);
    }

    #[test]
    fn empty_view_yields_empty_aggregates() {
        let empty = Dataset::default();
        assert!(CollisionStats::category_counts(&empty, CategoryField::VehicleType).is_empty());
        let cyclists_killed = StreetMetric::killed(AffectedClass::Cyclists);
        assert!(CollisionStats::top_streets(&empty, cyclists_killed).is_empty());
        assert_eq!(CollisionStats::minute_histogram(&empty, 3).total(), 0);
    }

    #[test]
    fn parallel_aggregates_use_independent_rankings() {
        let data: Dataset = vec![
            Record {
                cyclists_injured: 2,
                motorists_killed: 1,
                ..test_record("2022-07-14 14:05", Some("BROADWAY"))
            },
            Record {
                cyclists_injured: 1,
                ..test_record("2022-07-14 09:00", Some("ATLANTIC AVENUE"))
            },
        ]
        .into_iter()
        .collect();

        let views = RecordFilter::split_views(&data, 0, 14).unwrap();
        let aggregates = CollisionStats::compute_all_parallel(
            &views,
            AffectedClass::Cyclists,
            AffectedClass::Motorists,
        );

        assert_eq!(aggregates.injury_ranking.len(), 2);
        assert_eq!(aggregates.fatality_ranking.len(), 1);
        assert_eq!(aggregates.fatality_ranking[0].street, "BROADWAY");
        assert_eq!(aggregates.fatality_metric.column(), "number of motorist killed");
        assert_eq!(aggregates.histogram.total(), 1);
        assert!(aggregates.centroid.is_some());
    }
}
