//! Weighted DBSCAN over fixed-size feature rows.
//!
//! # The Algorithm (Ester et al., 1996)
//!
//! DBSCAN groups points by neighborhood density. Unlike k-means, it:
//!
//! - Discovers clusters of arbitrary shape
//! - Automatically determines the number of clusters
//! - Identifies noise points (outliers)
//!
//! ## Core Concepts
//!
//! - **Epsilon (ε)**: Maximum distance between two points to be neighbors.
//! - **min_samples**: Minimum *weighted* mass within ε for a point to be "core".
//! - **Core point**: Its ε-neighborhood (itself included) weighs at least min_samples.
//! - **Border point**: Within ε of a core point but not core itself.
//! - **Noise point**: Neither core nor border, labeled [`NOISE`].
//!
//! ## Weighting
//!
//! A point's weight counts toward the density of every neighborhood it falls
//! in, as if the point were repeated `weight` times without actually being
//! duplicated. A single zone-hour with heavy demand can therefore be core on
//! its own.
//!
//! ## Determinism
//!
//! Core points are seeded in input order and labels are numbered 0, 1, 2, …
//! in discovery order. A border point reachable from two clusters keeps the
//! label of the first one that reached it. The same input and ε always yield
//! the same labels.
//!
//! ## Complexity
//!
//! - **Time**: O(n log n) neighborhood queries through an R-tree, plus the
//!   size of all neighborhoods.
//! - **Space**: O(Σ |neighborhood|).
//!
//! ## References
//!
//! Ester et al. (1996). "A Density-Based Algorithm for Discovering Clusters
//! in Large Spatial Databases with Noise." KDD-96.

use std::collections::VecDeque;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::traits::Clustering;
use super::util;
use crate::error::{Error, Result};

/// Label assigned to points that belong to no cluster.
pub const NOISE: i32 = -1;

/// Weighted DBSCAN clustering algorithm.
#[derive(Debug, Clone)]
pub struct Dbscan {
    /// Epsilon: maximum distance for neighborhood.
    epsilon: f64,
    /// Weighted mass needed for core point classification.
    min_samples: usize,
}

/// A feature row with its input index for R-tree queries.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint<const D: usize> {
    idx: usize,
    coords: [f64; D],
}

impl<const D: usize> RTreeObject for IndexedPoint<D> {
    type Envelope = AABB<[f64; D]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl<const D: usize> PointDistance for IndexedPoint<D> {
    fn distance_2(&self, point: &[f64; D]) -> f64 {
        util::squared_euclidean(&self.coords, point)
    }
}

impl Dbscan {
    /// Create a new weighted DBSCAN clusterer.
    ///
    /// # Arguments
    ///
    /// * `epsilon` - Maximum distance between two points to be neighbors.
    /// * `min_samples` - Minimum neighborhood weight for a core point.
    pub fn new(epsilon: f64, min_samples: usize) -> Self {
        Self {
            epsilon,
            min_samples,
        }
    }

    /// Set epsilon (neighborhood radius).
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the core-point density threshold.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Neighborhood radius.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn validate<const D: usize>(&self, data: &[[f64; D]], weights: &[f64]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(Error::InvalidParameter {
                name: "epsilon",
                message: "must be positive and finite",
            });
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1",
            });
        }
        if weights.len() != data.len() {
            return Err(Error::DimensionMismatch {
                expected: data.len(),
                found: weights.len(),
            });
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidParameter {
                name: "weights",
                message: "must be finite and non-negative",
            });
        }
        if data.iter().flatten().any(|c| !c.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "data",
                message: "coordinates must be finite",
            });
        }
        Ok(())
    }

    /// Find all neighbors within epsilon (each point is its own neighbor).
    fn neighborhoods<const D: usize>(&self, data: &[[f64; D]]) -> Vec<Vec<usize>> {
        let indexed: Vec<IndexedPoint<D>> = data
            .iter()
            .enumerate()
            .map(|(idx, &coords)| IndexedPoint { idx, coords })
            .collect();
        let tree = RTree::bulk_load(indexed);
        let radius_2 = self.epsilon * self.epsilon;

        data.iter()
            .map(|p| {
                let mut found: Vec<usize> = tree
                    .locate_within_distance(*p, radius_2)
                    .map(|q| q.idx)
                    .collect();
                found.sort_unstable();
                found
            })
            .collect()
    }

    /// Expand cluster from a core point.
    fn expand_cluster(
        seed: usize,
        neighborhoods: &[Vec<usize>],
        is_core: &[bool],
        labels: &mut [i32],
        cluster_id: i32,
    ) {
        // Breadth-first, iterative (avoid deep recursion).
        let mut to_process = VecDeque::from([seed]);

        while let Some(idx) = to_process.pop_front() {
            if labels[idx] != NOISE {
                continue;
            }
            labels[idx] = cluster_id;

            // Only core points propagate; border points stop the walk.
            if is_core[idx] {
                to_process.extend(
                    neighborhoods[idx]
                        .iter()
                        .copied()
                        .filter(|&n| labels[n] == NOISE),
                );
            }
        }
    }
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(0.5, 5)
    }
}

impl Clustering for Dbscan {
    fn fit_predict<const D: usize>(
        &self,
        data: &[[f64; D]],
        weights: &[f64],
    ) -> Result<Vec<i32>> {
        self.validate(data, weights)?;

        let neighborhoods = self.neighborhoods(data);
        let threshold = self.min_samples as f64;
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .map(|hood| hood.iter().map(|&j| weights[j]).sum::<f64>() >= threshold)
            .collect();

        let mut labels = vec![NOISE; data.len()];
        let mut cluster_id: i32 = 0;

        for idx in 0..data.len() {
            if labels[idx] != NOISE || !is_core[idx] {
                continue;
            }
            Self::expand_cluster(idx, &neighborhoods, &is_core, &mut labels, cluster_id);
            cluster_id += 1;
        }

        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::traits::Point3;

    fn flat(points: &[(f64, f64)]) -> Vec<Point3> {
        points.iter().map(|&(x, y)| [x, y, 0.0]).collect()
    }

    #[test]
    fn test_dbscan_two_clusters() {
        let data = flat(&[
            // Cluster 1: around (0, 0)
            (0.0, 0.0),
            (0.1, 0.0),
            (0.0, 0.1),
            (0.1, 0.1),
            (0.05, 0.05),
            // Cluster 2: around (5, 5)
            (5.0, 5.0),
            (5.1, 5.0),
            (5.0, 5.1),
            (5.1, 5.1),
            (5.05, 5.05),
        ]);

        let labels = Dbscan::new(0.3, 3).fit_predict_unweighted(&data).unwrap();

        assert_eq!(labels.len(), 10);
        assert!(labels[..5].iter().all(|&l| l == 0));
        assert!(labels[5..].iter().all(|&l| l == 1));
    }

    #[test]
    fn test_dbscan_with_noise() {
        let data = flat(&[
            (0.0, 0.0),
            (0.1, 0.0),
            (0.0, 0.1),
            (0.1, 0.1),
            // Outlier
            (100.0, 100.0),
            (5.0, 5.0),
            (5.1, 5.0),
            (5.0, 5.1),
            (5.1, 5.1),
        ]);

        let labels = Dbscan::new(0.3, 3).fit_predict_unweighted(&data).unwrap();

        assert_eq!(labels[4], NOISE);
        for (i, label) in labels.iter().enumerate() {
            if i != 4 {
                assert!(*label >= 0);
            }
        }
    }

    #[test]
    fn test_dbscan_all_noise() {
        let data = flat(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
        let labels = Dbscan::new(0.5, 3).fit_predict_unweighted(&data).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn test_dbscan_chain() {
        // Chain of points - DBSCAN should connect them
        let data: Vec<Point3> = (0..10).map(|i| [i as f64 * 0.3, 0.0, 0.0]).collect();
        let labels = Dbscan::new(0.5, 2).fit_predict_unweighted(&data).unwrap();
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_weight_makes_isolated_point_core() {
        let data = flat(&[(0.0, 0.0), (50.0, 50.0)]);
        let labels = Dbscan::new(1.0, 10).fit_predict(&data, &[12.0, 1.0]).unwrap();
        assert_eq!(labels, vec![0, NOISE]);
    }

    #[test]
    fn test_heavy_neighbor_lifts_light_point() {
        // Neither point is dense alone at weight 1, but the heavy neighbor
        // pushes both neighborhoods over the threshold.
        let data = flat(&[(0.0, 0.0), (0.5, 0.0), (9.0, 9.0)]);
        let labels = Dbscan::new(1.0, 5).fit_predict(&data, &[1.0, 4.0, 1.0]).unwrap();
        assert_eq!(labels, vec![0, 0, NOISE]);
    }

    #[test]
    fn test_border_point_keeps_first_cluster() {
        // Point 2 sits between two dense pairs and is core in neither.
        let data = flat(&[(0.0, 0.0), (0.1, 0.0), (1.0, 0.0), (1.9, 0.0), (2.0, 0.0)]);
        let weights = [6.0, 5.0, 0.0, 5.0, 6.0];
        let labels = Dbscan::new(0.95, 11).fit_predict(&data, &weights).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_time_axis_separates_same_zone() {
        let data = vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1200.0 * 12.0]];
        let labels = Dbscan::new(500.0, 2).fit_predict_unweighted(&data).unwrap();
        assert_eq!(labels, vec![0, 0, NOISE]);
    }

    #[test]
    fn test_dbscan_empty() {
        let data: Vec<Point3> = vec![];
        assert!(matches!(
            Dbscan::new(0.5, 3).fit_predict_unweighted(&data),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_dbscan_invalid_params() {
        let data = vec![[0.0, 0.0, 0.0]];

        assert!(Dbscan::new(0.0, 3).fit_predict_unweighted(&data).is_err());
        assert!(Dbscan::new(-1.0, 3).fit_predict_unweighted(&data).is_err());
        assert!(Dbscan::new(0.5, 0).fit_predict_unweighted(&data).is_err());
        assert!(Dbscan::new(0.5, 1).fit_predict(&data, &[-1.0]).is_err());
        assert!(matches!(
            Dbscan::new(0.5, 1).fit_predict(&data, &[1.0, 1.0]),
            Err(Error::DimensionMismatch {
                expected: 1,
                found: 2
            })
        ));
    }
}
