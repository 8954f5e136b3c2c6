//! Origin-destination flow clustering.
//!
//! Trips are rolled up per `(origin zone, destination zone, pickup hour)`
//! into [`OdFlow`]s. Each flow with known endpoints becomes a 6-D point
//!
//! ```text
//! (x_o, y_o, x_d, y_d, bearing × angle_scale, length × length_scale)
//! ```
//!
//! so that flows whose endpoints lie close together *and* which run in the
//! same direction over a similar distance share a cluster. Weighted DBSCAN
//! runs once with a fixed radius; every flow's weight is its trip count.

use std::collections::BTreeMap;

use chrono::Timelike;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::dbscan::Dbscan;
use super::traits::Clustering;
use super::util;
use crate::error::{Error, Result};
use crate::features::{TripMeans, ZoneCoordinates};
use crate::timeseries::TripEvent;

/// One row of the flow feature matrix.
pub type FlowPoint = [f64; 6];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Radius in the scaled feature space.
    pub eps: f64,
    pub min_samples: usize,
    /// Meters per radian of bearing.
    pub angle_scale: f64,
    /// Feature units per meter of flow length.
    pub length_scale: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            eps: 1200.0,
            min_samples: 5,
            angle_scale: 3000.0,
            length_scale: 0.002,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::InvalidParameter {
                name: "flow.eps",
                message: "must be positive and finite",
            });
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "flow.min_samples",
                message: "must be at least 1",
            });
        }
        if !(self.angle_scale.is_finite() && self.angle_scale >= 0.0)
            || !(self.length_scale.is_finite() && self.length_scale >= 0.0)
        {
            return Err(Error::InvalidParameter {
                name: "flow scales",
                message: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}

/// Trips between two zones starting in one hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OdFlow {
    pub origin_zone: i64,
    pub destination_zone: i64,
    /// Pickup hour, 0-23.
    pub time_bin: u8,
    pub trip_count: u64,
    pub avg_fare: Option<f64>,
    /// `None` when no trip in the flow reports a duration.
    pub avg_duration_min: Option<f64>,
}

/// Roll trips up into flows, ordered by `(origin, destination, hour)`.
///
/// Trips without a destination are skipped.
pub fn build_flows(trips: &[TripEvent]) -> Vec<OdFlow> {
    let mut acc: BTreeMap<(i64, i64, u8), TripMeans> = BTreeMap::new();
    let mut undirected = 0usize;
    for trip in trips {
        let Some(destination) = trip.destination_location_id else {
            undirected += 1;
            continue;
        };
        let hour = trip.pickup_datetime.hour() as u8;
        acc.entry((trip.origin_location_id, destination, hour))
            .or_default()
            .add(trip);
    }
    if undirected > 0 {
        debug!("[Flow] {} trips had no destination", undirected);
    }

    acc.into_iter()
        .map(|((origin_zone, destination_zone, time_bin), means)| OdFlow {
            origin_zone,
            destination_zone,
            time_bin,
            trip_count: means.trips(),
            avg_fare: means.avg_fare(),
            avg_duration_min: means.avg_duration_min(),
        })
        .collect()
}

/// Flow cluster label with the geometry it was clustered on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowCluster {
    #[serde(flatten)]
    pub flow: OdFlow,
    pub flow_cluster_id: i32,
    /// Direction from origin to destination in radians, `atan2(dy, dx)`.
    pub bearing: f64,
    /// Straight-line distance between the zone centroids in meters.
    pub length_m: f64,
}

/// Cluster flows whose two endpoints have coordinates.
///
/// Flows with an unknown endpoint or non-finite features are dropped.
pub fn cluster_flows(
    flows: &[OdFlow],
    coords: &ZoneCoordinates,
    config: &FlowConfig,
) -> Result<Vec<FlowCluster>> {
    config.validate()?;

    let mut kept: Vec<(OdFlow, f64, f64)> = Vec::with_capacity(flows.len());
    let mut data: Vec<FlowPoint> = Vec::with_capacity(flows.len());
    for flow in flows {
        let (Some((xo, yo)), Some((xd, yd))) = (
            coords.get(flow.origin_zone),
            coords.get(flow.destination_zone),
        ) else {
            continue;
        };
        let (dx, dy) = (xd - xo, yd - yo);
        let length_m = dx.hypot(dy);
        let bearing = match dy.atan2(dx) {
            b if b.is_finite() => b,
            _ => 0.0,
        };

        let row = [
            xo,
            yo,
            xd,
            yd,
            bearing * config.angle_scale,
            length_m * config.length_scale,
        ];
        if row.iter().all(|v| v.is_finite()) {
            kept.push((*flow, bearing, length_m));
            data.push(row);
        }
    }
    if kept.len() < flows.len() {
        debug!(
            "[Flow] dropped {} flows without usable endpoints",
            flows.len() - kept.len()
        );
    }

    let weights: Vec<f64> = kept.iter().map(|(f, _, _)| f.trip_count as f64).collect();
    let labels = Dbscan::new(config.eps, config.min_samples).fit_predict(&data, &weights)?;

    info!(
        "[Flow] {} flows, {} clusters at eps={:.1}",
        kept.len(),
        util::cluster_sizes(&labels).len(),
        config.eps
    );

    Ok(kept
        .into_iter()
        .zip(labels)
        .map(|((flow, bearing, length_m), flow_cluster_id)| FlowCluster {
            flow,
            flow_cluster_id,
            bearing,
            length_m,
        })
        .collect())
}
