//! Demotion of oversized clusters to noise.
//!
//! Runs once on the labels chosen by the selector. Every non-noise cluster
//! holding more than the allowed fraction of all points is relabeled
//! [`NOISE`], provided the selected labels contain at least two clusters.
//! Fractions are measured against all points before any demotion and are
//! not recomputed afterwards, so the pass never cascades. A lone cluster is
//! never demoted, whatever its size.

use log::info;
use serde::{Deserialize, Serialize};

use super::dbscan::NOISE;
use super::util;

/// A cluster removed by [`purify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemotedCluster {
    pub cluster_id: i32,
    pub size: usize,
    /// Share of all points the cluster held before demotion.
    pub fraction: f64,
}

/// Labels after the purification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PurifyOutcome {
    pub labels: Vec<i32>,
    /// Demoted clusters, ordered by cluster id.
    pub demoted: Vec<DemotedCluster>,
}

/// Demote every cluster above `max_fraction` unless the labels hold a single cluster.
pub fn purify(mut labels: Vec<i32>, max_fraction: f64) -> PurifyOutcome {
    let n = labels.len();
    let sizes = util::cluster_sizes(&labels);
    if n == 0 || sizes.len() < 2 {
        return PurifyOutcome {
            labels,
            demoted: Vec::new(),
        };
    }

    let demoted: Vec<DemotedCluster> = sizes
        .iter()
        .map(|(&cluster_id, &size)| DemotedCluster {
            cluster_id,
            size,
            fraction: size as f64 / n as f64,
        })
        .filter(|c| c.fraction > max_fraction)
        .collect();

    for l in labels.iter_mut() {
        if demoted.iter().any(|c| c.cluster_id == *l) {
            *l = NOISE;
        }
    }
    for c in &demoted {
        info!(
            "[Purify] Re-labeled cluster {} ({} points, fraction {:.3}) as noise (threshold={:.2})",
            c.cluster_id, c.size, c.fraction, max_fraction
        );
    }

    PurifyOutcome { labels, demoted }
}
