//! Per-cluster demand time series.
//!
//! Raw trips are first rolled up into a daily `(date, hour, zone)` table,
//! which is memoized through a [`DailyCache`]. The rolled-up table is then
//! joined to the frozen cluster assignments and summed per
//! `(cluster, timestamp)` into one ordered series per cluster and
//! [`MetricTarget`].

mod aggregate;
mod cache;

pub use aggregate::{aggregate, build_daily, load_or_build_daily};
pub use cache::{DailyCache, JsonFileCache, MemoryCache};

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// What a series measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricTarget {
    /// Number of trips.
    Count,
    /// Summed monetary value of the trips.
    Value,
}

impl fmt::Display for MetricTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricTarget::Count => f.write_str("count"),
            MetricTarget::Value => f.write_str("value"),
        }
    }
}

/// Monetary components of a trip. Missing parts count as zero; negative
/// adjustments (refunds, corrections) are summed as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FareComponents {
    pub base_passenger_fare: Option<f64>,
    pub tolls: Option<f64>,
    pub bcf: Option<f64>,
    pub sales_tax: Option<f64>,
    pub congestion_surcharge: Option<f64>,
    pub airport_fee: Option<f64>,
    pub tips: Option<f64>,
    pub driver_pay: Option<f64>,
}

impl FareComponents {
    pub fn total(&self) -> f64 {
        [
            self.base_passenger_fare,
            self.tolls,
            self.bcf,
            self.sales_tax,
            self.congestion_surcharge,
            self.airport_fee,
            self.tips,
            self.driver_pay,
        ]
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .sum()
    }
}

/// One raw trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub pickup_datetime: NaiveDateTime,
    pub origin_location_id: i64,
    #[serde(default)]
    pub destination_location_id: Option<i64>,
    /// Trip duration in seconds.
    #[serde(default)]
    pub trip_time: Option<f64>,
    #[serde(flatten)]
    pub fares: FareComponents,
}

/// Trips rolled up per `(date, hour, location_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyZoneHour {
    pub date: NaiveDate,
    pub hour: u8,
    pub location_id: i64,
    pub trip_count: u64,
    /// Present only when the table was built with monetary aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_value: Option<f64>,
}

/// One point of a cluster's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub cluster_id: i32,
    pub timestamp: NaiveDateTime,
    pub hour: u8,
    pub value: f64,
    pub metric_target: MetricTarget,
}

/// All cluster series, ordered by `(metric_target, cluster_id, timestamp)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterSeries {
    points: Vec<SeriesPoint>,
}

impl ClusterSeries {
    /// Sorts the points into series order.
    pub fn new(mut points: Vec<SeriesPoint>) -> Self {
        points.sort_by(|a, b| {
            (a.metric_target, a.cluster_id, a.timestamp).cmp(&(
                b.metric_target,
                b.cluster_id,
                b.timestamp,
            ))
        });
        Self { points }
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Contiguous `(cluster_id, metric_target, points)` groups, each timestamp-sorted.
    pub fn groups(&self) -> impl Iterator<Item = (i32, MetricTarget, &[SeriesPoint])> + '_ {
        self.points
            .chunk_by(|a, b| a.cluster_id == b.cluster_id && a.metric_target == b.metric_target)
            .map(|g| (g[0].cluster_id, g[0].metric_target, g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    fn point(cluster_id: i32, target: MetricTarget, ts: NaiveDateTime) -> SeriesPoint {
        SeriesPoint {
            cluster_id,
            timestamp: ts,
            hour: 0,
            value: 1.0,
            metric_target: target,
        }
    }

    #[test]
    fn fare_total_skips_missing_and_keeps_adjustments() {
        let fares = FareComponents {
            base_passenger_fare: Some(10.0),
            tolls: Some(-3.0),
            tips: Some(2.5),
            driver_pay: None,
            ..Default::default()
        };
        assert_eq!(fares.total(), 9.5);
    }

    #[test]
    fn series_groups_are_sorted() {
        let series = ClusterSeries::new(vec![
            point(2, MetricTarget::Count, at(2, 0)),
            point(1, MetricTarget::Value, at(1, 0)),
            point(1, MetricTarget::Count, at(2, 0)),
            point(1, MetricTarget::Count, at(1, 5)),
        ]);

        let groups: Vec<_> = series.groups().map(|(c, t, g)| (c, t, g.len())).collect();
        assert_eq!(
            groups,
            vec![
                (1, MetricTarget::Count, 2),
                (2, MetricTarget::Count, 1),
                (1, MetricTarget::Value, 1),
            ]
        );
        let first = series.groups().next().unwrap().2;
        assert!(first[0].timestamp < first[1].timestamp);
    }

    #[test]
    fn trip_event_reads_flat_json() {
        let json = r#"{"pickup_datetime": "2024-03-01T08:15:00", "origin_location_id": 161, "tips": 3.0}"#;
        let trip: TripEvent = serde_json::from_str(json).unwrap();
        assert_eq!(trip.origin_location_id, 161);
        assert_eq!(trip.fares.total(), 3.0);
    }
}
