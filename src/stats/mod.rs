//! Stats module - Aggregations over collision views

mod calculator;

pub use calculator::{
    Aggregates, CategoryCount, CategoryField, CollisionStats, GeoPoint, MinuteHistogram,
    StreetMetric, StreetRanking, FATALITY_RANKING_LIMIT, INJURY_RANKING_LIMIT, MINUTES_PER_HOUR,
};
