//! Space-time demand clustering and cluster stability scoring.
//!
//! `zonepulse` groups the zone-hours of a ride-hail market into demand
//! clusters and then asks how steady each cluster's demand is over time.
//!
//! The crate is organised as two batch stages:
//!
//! 1. **Clustering** ([`pipeline::run_clustering`]): zone-hour intensities
//!    become weighted points in a `(x, y, hour)` feature space
//!    ([`features`]), a weighted DBSCAN radius is chosen adaptively
//!    ([`cluster::select`]) and oversized background clusters are demoted
//!    to noise ([`cluster::purify`]). The result is a frozen
//!    [`AssignmentTable`].
//! 2. **Stability** ([`pipeline::run_stability`]): raw trips are rolled up
//!    into a cached daily table ([`timeseries`]), joined to the assignments
//!    and scored per cluster with DTW, autocorrelation and hourly SNR
//!    ([`stability`]).
//!
//! Alongside the zone-hour clusters, whole zones can be clustered spatially
//! ([`cluster::cluster_zones`]) and origin-destination flows grouped by
//! endpoints and direction ([`cluster::cluster_flows`]).
//!
//! Both stages are configured through [`PipelineConfig`].

#![forbid(unsafe_code)]

pub mod assignment;
pub mod cluster;
pub mod config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod schema;
pub mod stability;
pub mod synthetic;
pub mod timeseries;

pub use assignment::{AssignmentTable, ClusterAssignment};
pub use cluster::{Clustering, Dbscan, SelectorConfig, NOISE};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use features::{ZoneCoordinate, ZoneCoordinates, ZoneHourIntensity};
pub use pipeline::{run_clustering, run_stability, ClusteringOutput, StabilityOutput};
pub use stability::{ClusterMetrics, MetricsSummary};
pub use timeseries::{MetricTarget, TripEvent};
