//! Zone-hour feature construction.
//!
//! Each zone observed at one hour of the day becomes a point
//! `(x_meters, y_meters, hour × time_scale)`. `time_scale` converts one hour
//! into meters, so plain Euclidean distance blends space and time: with the
//! default of 1200, two consecutive hours of the same zone are as far apart
//! as two zones 1.2 km apart at the same hour.

use std::collections::{BTreeMap, HashMap};

use chrono::Timelike;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::cluster::Point3;
use crate::error::{Error, Result};
use crate::schema;
use crate::timeseries::TripEvent;

/// Demand intensity of one zone at one hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneHourIntensity {
    pub location_id: i64,
    pub hour: u8,
    pub intensity: f64,
}

/// Planar position of a zone, supplied by an external projection step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneCoordinate {
    pub location_id: i64,
    pub x_meters: f64,
    pub y_meters: f64,
}

/// `location_id → (x_meters, y_meters)` lookup. The first entry per zone wins.
#[derive(Debug, Clone, Default)]
pub struct ZoneCoordinates {
    by_zone: HashMap<i64, (f64, f64)>,
}

impl ZoneCoordinates {
    pub fn get(&self, location_id: i64) -> Option<(f64, f64)> {
        self.by_zone.get(&location_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_zone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_zone.is_empty()
    }
}

impl FromIterator<ZoneCoordinate> for ZoneCoordinates {
    fn from_iter<I: IntoIterator<Item = ZoneCoordinate>>(iter: I) -> Self {
        let mut by_zone = HashMap::new();
        for c in iter {
            by_zone
                .entry(c.location_id)
                .or_insert((c.x_meters, c.y_meters));
        }
        Self { by_zone }
    }
}

/// A clusterable zone-hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneHourPoint {
    pub location_id: i64,
    pub hour: u8,
    pub weight: f64,
    pub x_meters: f64,
    pub y_meters: f64,
}

/// Feature matrix with index-aligned points and weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub points: Vec<ZoneHourPoint>,
    pub matrix: Vec<Point3>,
    pub weights: Vec<f64>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Build clustering features from intensity records.
///
/// Duplicate `(location_id, hour)` keys keep their first occurrence, even
/// when that row is later dropped. Records without coordinates or with
/// intensity ≤ 0 are then dropped.
pub fn build_features(
    records: &[ZoneHourIntensity],
    coords: &ZoneCoordinates,
    time_scale: f64,
) -> Result<FeatureSet> {
    if !(time_scale.is_finite() && time_scale >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "time_scale",
            message: "must be finite and non-negative",
        });
    }

    for (row, r) in records.iter().enumerate() {
        if r.hour > 23 {
            return Err(Error::InvalidRecord {
                table: "intensity",
                row,
                message: format!("hour {} outside 0..=23", r.hour),
            });
        }
        if !r.intensity.is_finite() || r.intensity < 0.0 {
            return Err(Error::InvalidRecord {
                table: "intensity",
                row,
                message: format!("intensity {} must be finite and non-negative", r.intensity),
            });
        }
    }

    let (unique, _) = schema::dedup_first_wins(records.to_vec(), |r| (r.location_id, r.hour));

    let mut missing_coords = 0usize;
    let points: Vec<ZoneHourPoint> = unique
        .into_iter()
        .filter(|r| r.intensity > 0.0)
        .filter_map(|r| match coords.get(r.location_id) {
            Some((x_meters, y_meters)) => Some(ZoneHourPoint {
                location_id: r.location_id,
                hour: r.hour,
                weight: r.intensity,
                x_meters,
                y_meters,
            }),
            None => {
                missing_coords += 1;
                None
            }
        })
        .collect();
    if missing_coords > 0 {
        debug!("[Features] {} records had no zone coordinates", missing_coords);
    }

    let matrix = points
        .iter()
        .map(|p| [p.x_meters, p.y_meters, f64::from(p.hour) * time_scale])
        .collect();
    let weights = points.iter().map(|p| p.weight).collect();

    Ok(FeatureSet {
        points,
        matrix,
        weights,
    })
}

/// Count trips per `(origin zone, pickup hour)`, busiest first.
pub fn zone_hour_density(trips: &[TripEvent]) -> Vec<ZoneHourIntensity> {
    let mut counts: BTreeMap<(i64, u8), u64> = BTreeMap::new();
    for trip in trips {
        let hour = trip.pickup_datetime.hour() as u8;
        *counts.entry((trip.origin_location_id, hour)).or_insert(0) += 1;
    }

    let mut out: Vec<ZoneHourIntensity> = counts
        .into_iter()
        .map(|((location_id, hour), n)| ZoneHourIntensity {
            location_id,
            hour,
            intensity: n as f64,
        })
        .collect();
    // Stable sort keeps key order among equal counts.
    out.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    out
}

/// Demand of one zone across the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneTotal {
    pub location_id: i64,
    pub trip_count_total: f64,
    /// Hours of the day with non-zero intensity.
    pub persistence_hours: u32,
}

/// Sum intensity per zone, ordered by `location_id`.
pub fn zone_totals(records: &[ZoneHourIntensity]) -> Vec<ZoneTotal> {
    let mut acc: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for r in records {
        let entry = acc.entry(r.location_id).or_insert((0.0, 0));
        entry.0 += r.intensity;
        if r.intensity > 0.0 {
            entry.1 += 1;
        }
    }
    acc.into_iter()
        .map(|(location_id, (trip_count_total, persistence_hours))| ZoneTotal {
            location_id,
            trip_count_total,
            persistence_hours,
        })
        .collect()
}

/// Running fare and duration sums over a group of trips.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TripMeans {
    trips: u64,
    fare_sum: f64,
    duration_sum: f64,
    timed_trips: u64,
}

impl TripMeans {
    pub(crate) fn add(&mut self, trip: &TripEvent) {
        self.trips += 1;
        self.fare_sum += trip.fares.total();
        if let Some(seconds) = trip.trip_time.filter(|t| t.is_finite()) {
            self.duration_sum += seconds / 60.0;
            self.timed_trips += 1;
        }
    }

    pub(crate) fn trips(&self) -> u64 {
        self.trips
    }

    pub(crate) fn avg_fare(&self) -> Option<f64> {
        (self.trips > 0).then(|| self.fare_sum / self.trips as f64)
    }

    /// Mean over the trips that report a duration.
    pub(crate) fn avg_duration_min(&self) -> Option<f64> {
        (self.timed_trips > 0).then(|| self.duration_sum / self.timed_trips as f64)
    }
}

/// Mean fare and duration of the trips picked up in one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneTripAverages {
    pub location_id: i64,
    pub avg_fare: Option<f64>,
    pub avg_duration_min: Option<f64>,
}

/// Average fare and duration per origin zone, ordered by `location_id`.
pub fn zone_trip_averages(trips: &[TripEvent]) -> Vec<ZoneTripAverages> {
    let mut acc: BTreeMap<i64, TripMeans> = BTreeMap::new();
    for trip in trips {
        acc.entry(trip.origin_location_id).or_default().add(trip);
    }
    acc.into_iter()
        .map(|(location_id, means)| ZoneTripAverages {
            location_id,
            avg_fare: means.avg_fare(),
            avg_duration_min: means.avg_duration_min(),
        })
        .collect()
}
