//! Zone-level spatial clustering.
//!
//! Ignores the hour of day: each zone is one 2-D point weighted by its total
//! demand, clustered with a single fixed radius. Zone fare and duration
//! averages can be attached afterwards from the raw trips.

use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};

use super::dbscan::Dbscan;
use super::traits::Clustering;
use super::util;
use crate::error::Result;
use crate::features::{zone_trip_averages, ZoneCoordinates, ZoneTotal};
use crate::timeseries::TripEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Radius in meters between zone centroids.
    pub eps: f64,
    pub min_samples: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            eps: 1600.0,
            min_samples: 5,
        }
    }
}

/// Spatial cluster label of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneCluster {
    pub location_id: i64,
    pub cluster_id: i32,
    pub trip_count_total: f64,
    pub persistence_hours: u32,
    pub x_meters: f64,
    pub y_meters: f64,
    /// Mean fare of the trips picked up in the zone.
    pub avg_fare: Option<f64>,
    /// Mean trip duration in minutes.
    pub avg_duration_min: Option<f64>,
}

/// Cluster zones with positive demand and known coordinates.
pub fn cluster_zones(
    totals: &[ZoneTotal],
    coords: &ZoneCoordinates,
    config: &SpatialConfig,
) -> Result<Vec<ZoneCluster>> {
    let zones: Vec<(ZoneTotal, (f64, f64))> = totals
        .iter()
        .filter(|t| t.trip_count_total > 0.0)
        .filter_map(|t| coords.get(t.location_id).map(|xy| (*t, xy)))
        .collect();

    let data: Vec<[f64; 2]> = zones.iter().map(|(_, (x, y))| [*x, *y]).collect();
    let weights: Vec<f64> = zones.iter().map(|(t, _)| t.trip_count_total).collect();
    let labels = Dbscan::new(config.eps, config.min_samples).fit_predict(&data, &weights)?;

    info!(
        "[Spatial] {} zones, {} clusters at eps={:.1}",
        zones.len(),
        util::cluster_sizes(&labels).len(),
        config.eps
    );

    Ok(zones
        .into_iter()
        .zip(labels)
        .map(|((t, (x_meters, y_meters)), cluster_id)| ZoneCluster {
            location_id: t.location_id,
            cluster_id,
            trip_count_total: t.trip_count_total,
            persistence_hours: t.persistence_hours,
            x_meters,
            y_meters,
            avg_fare: None,
            avg_duration_min: None,
        })
        .collect())
}

/// Fill in `avg_fare` and `avg_duration_min` from the trips leaving each zone.
///
/// Zones without trips keep `None`.
pub fn attach_trip_averages(zones: &mut [ZoneCluster], trips: &[TripEvent]) {
    let averages: HashMap<i64, _> = zone_trip_averages(trips)
        .into_iter()
        .map(|a| (a.location_id, a))
        .collect();
    for zone in zones.iter_mut() {
        if let Some(a) = averages.get(&zone.location_id) {
            zone.avg_fare = a.avg_fare;
            zone.avg_duration_min = a.avg_duration_min;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ZoneCoordinate;

    #[test]
    fn groups_nearby_zones() {
        let coords: ZoneCoordinates = [(1, 0.0), (2, 500.0), (3, 900.0), (4, 20_000.0)]
            .into_iter()
            .map(|(id, x)| ZoneCoordinate {
                location_id: id,
                x_meters: x,
                y_meters: 0.0,
            })
            .collect();
        let totals: Vec<ZoneTotal> = (1..=5)
            .map(|id| ZoneTotal {
                location_id: id,
                trip_count_total: 3.0,
                persistence_hours: 4,
            })
            .collect();

        let out = cluster_zones(&totals, &coords, &SpatialConfig::default()).unwrap();

        // Zone 5 has no coordinates.
        assert_eq!(out.len(), 4);
        assert!(out[..3].iter().all(|z| z.cluster_id == 0));
        assert_eq!(out[3].cluster_id, -1);
    }

    #[test]
    fn attaches_zone_averages() {
        use crate::timeseries::FareComponents;
        use chrono::NaiveDate;

        let zone = |location_id: i64| ZoneCluster {
            location_id,
            cluster_id: 0,
            trip_count_total: 1.0,
            persistence_hours: 1,
            x_meters: 0.0,
            y_meters: 0.0,
            avg_fare: None,
            avg_duration_min: None,
        };
        let trip = |fare: f64, seconds: f64| TripEvent {
            pickup_datetime: NaiveDate::from_ymd_opt(2024, 3, 4)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .unwrap(),
            origin_location_id: 7,
            destination_location_id: None,
            trip_time: Some(seconds),
            fares: FareComponents {
                base_passenger_fare: Some(fare),
                tips: Some(2.0),
                ..Default::default()
            },
        };

        let mut zones = vec![zone(7), zone(8)];
        attach_trip_averages(&mut zones, &[trip(10.0, 300.0), trip(20.0, 900.0)]);

        assert_eq!(zones[0].avg_fare, Some(17.0));
        assert_eq!(zones[0].avg_duration_min, Some(10.0));
        assert_eq!(zones[1].avg_fare, None);
        assert_eq!(zones[1].avg_duration_min, None);
    }
}
