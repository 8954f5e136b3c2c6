//! Density clustering of zone-hour demand.
//!
//! ## Weighted DBSCAN
//!
//! Density-based clustering that discovers clusters of arbitrary shape and
//! labels outliers as noise (`-1`). Every point carries a weight (its trip
//! intensity) that counts toward the density of each neighborhood it falls
//! in, so a busy zone-hour weighs as much as many quiet ones.
//!
//! ## Adaptive radius
//!
//! The right ε depends on the city and the month of data. [`select`] walks
//! a descending [`EpsSchedule`] and keeps the first radius whose labels pass
//! the quality gates of a [`SelectorConfig`], falling back to the smallest
//! radius when none does.
//!
//! ## Purification
//!
//! Even the chosen radius can leave dominant "background" clusters.
//! [`purify`] demotes every one of them to noise in a single pass, unless
//! the run produced only one cluster.
//!
//! ## Flows
//!
//! [`cluster_flows`] reuses the same weighted DBSCAN on origin-destination
//! flows, embedded with their bearing and length.
//!
//! ## Usage
//!
//! ```rust
//! use zonepulse::cluster::{purify, select, Clustering, Dbscan, SelectorConfig};
//!
//! let data = vec![
//!     [0.0, 0.0, 0.0],
//!     [10.0, 0.0, 0.0],
//!     [5000.0, 0.0, 0.0],
//!     [5010.0, 0.0, 0.0],
//! ];
//! let weights = vec![3.0, 3.0, 3.0, 3.0];
//!
//! // One radius
//! let labels = Dbscan::new(100.0, 5).fit_predict(&data, &weights).unwrap();
//! assert_eq!(labels, vec![0, 0, 1, 1]);
//!
//! // Adaptive radius
//! let config = SelectorConfig {
//!     base_eps: 8000.0,
//!     min_samples: 5,
//!     eps_factors: vec![1.0],
//!     backstop_eps: vec![100.0],
//!     min_clusters: 2,
//!     ..Default::default()
//! };
//! let selection = select(&data, &weights, &config).unwrap();
//! assert_eq!(selection.eps, 100.0);
//!
//! let purified = purify(selection.labels, config.max_largest_cluster_fraction);
//! assert!(purified.demoted.is_empty());
//! ```

mod dbscan;
mod flow;
mod purify;
mod selector;
mod spatial;
mod traits;
mod util;

pub use dbscan::{Dbscan, NOISE};
pub use flow::{build_flows, cluster_flows, FlowCluster, FlowConfig, FlowPoint, OdFlow};
pub use purify::{purify, DemotedCluster, PurifyOutcome};
pub use selector::{
    evaluate_candidate, select, CandidateRun, EpsSchedule, RunQuality, Selection, SelectorConfig,
};
pub use spatial::{attach_trip_averages, cluster_zones, SpatialConfig, ZoneCluster};
pub use traits::{Clustering, Point3};
