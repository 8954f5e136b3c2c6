//! Adaptive eps selection for space-time DBSCAN.
//!
//! A single global radius either glues every zone-hour into one blob or
//! shatters the city into noise. The selector walks a descending schedule of
//! radii and keeps the first one whose labels pass three quality gates:
//!
//! - enough points end up in clusters (`min_non_noise_fraction`)
//! - no cluster swallows too much (`max_largest_cluster_fraction`)
//! - the cluster count is in `[min_clusters, max_clusters]`
//!
//! When no radius qualifies, the smallest one tried is used. That fallback is
//! a policy decision and is logged, never raised.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::dbscan::{Dbscan, NOISE};
use super::traits::{Clustering, Point3};
use super::util;
use crate::error::{Error, Result};

/// Candidate radii, strictly decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct EpsSchedule(Vec<f64>);

impl EpsSchedule {
    /// Sort candidates largest first and drop exact duplicates.
    pub fn new(candidates: impl IntoIterator<Item = f64>) -> Result<Self> {
        let mut eps: Vec<f64> = candidates.into_iter().collect();
        if eps.is_empty() {
            return Err(Error::InvalidParameter {
                name: "eps_schedule",
                message: "must contain at least one candidate",
            });
        }
        if eps.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(Error::InvalidParameter {
                name: "eps_schedule",
                message: "candidates must be positive and finite",
            });
        }
        eps.sort_by(|a, b| b.total_cmp(a));
        eps.dedup();
        Ok(Self(eps))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The smallest radius, used when nothing passes the gates.
    pub fn backstop(&self) -> f64 {
        self.0[self.0.len() - 1]
    }
}

/// Selector configuration. Immutable once built; passed by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Starting radius in feature-space meters.
    pub base_eps: f64,
    /// Weighted neighborhood mass for a core point.
    pub min_samples: usize,
    /// Multiples of `base_eps` tried before the backstops.
    pub eps_factors: Vec<f64>,
    /// Absolute radii appended to the schedule.
    pub backstop_eps: Vec<f64>,
    pub min_non_noise_fraction: f64,
    pub max_largest_cluster_fraction: f64,
    pub min_clusters: usize,
    pub max_clusters: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            base_eps: 3800.0,
            min_samples: 30,
            eps_factors: vec![1.0, 0.85, 0.70, 0.60, 0.50],
            backstop_eps: vec![2200.0, 2000.0, 1800.0, 1600.0],
            min_non_noise_fraction: 0.20,
            max_largest_cluster_fraction: 0.5,
            min_clusters: 3,
            max_clusters: 40,
        }
    }
}

impl SelectorConfig {
    /// Check ranges; called by [`select`] before any clustering runs.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_eps.is_finite() && self.base_eps > 0.0) {
            return Err(Error::InvalidParameter {
                name: "base_eps",
                message: "must be positive and finite",
            });
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1",
            });
        }
        if !(0.0..=1.0).contains(&self.min_non_noise_fraction) {
            return Err(Error::InvalidParameter {
                name: "min_non_noise_fraction",
                message: "must be within [0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.max_largest_cluster_fraction) {
            return Err(Error::InvalidParameter {
                name: "max_largest_cluster_fraction",
                message: "must be within [0, 1]",
            });
        }
        if self.min_clusters > self.max_clusters {
            return Err(Error::InvalidParameter {
                name: "min_clusters",
                message: "must not exceed max_clusters",
            });
        }
        Ok(())
    }

    /// `base_eps × eps_factors` followed by the backstops, largest first.
    pub fn schedule(&self) -> Result<EpsSchedule> {
        let scaled = self.eps_factors.iter().map(|f| self.base_eps * f);
        EpsSchedule::new(scaled.chain(self.backstop_eps.iter().copied()))
    }
}

/// Quality numbers of one clustering run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunQuality {
    pub eps: f64,
    pub n_points: usize,
    pub n_clusters: usize,
    pub non_noise_fraction: f64,
    pub largest_cluster_fraction: f64,
}

impl RunQuality {
    pub fn from_labels(eps: f64, labels: &[i32]) -> Self {
        let n_points = labels.len();
        let sizes = util::cluster_sizes(labels);
        if n_points == 0 || sizes.is_empty() {
            return Self {
                eps,
                n_points,
                n_clusters: 0,
                non_noise_fraction: 0.0,
                largest_cluster_fraction: 0.0,
            };
        }

        let n = n_points as f64;
        let non_noise = labels.iter().filter(|&&l| l != NOISE).count();
        let largest = util::largest_cluster(&sizes).map_or(0, |(_, size)| size);
        Self {
            eps,
            n_points,
            n_clusters: sizes.len(),
            non_noise_fraction: non_noise as f64 / n,
            largest_cluster_fraction: largest as f64 / n,
        }
    }

    /// Whether this run passes all three gates of `config`.
    pub fn passes(&self, config: &SelectorConfig) -> bool {
        self.non_noise_fraction >= config.min_non_noise_fraction
            && self.largest_cluster_fraction <= config.max_largest_cluster_fraction
            && (config.min_clusters..=config.max_clusters).contains(&self.n_clusters)
    }
}

/// One schedule entry evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRun {
    pub labels: Vec<i32>,
    pub quality: RunQuality,
}

/// Run weighted DBSCAN once at `eps`.
pub fn evaluate_candidate(
    data: &[Point3],
    weights: &[f64],
    eps: f64,
    min_samples: usize,
) -> Result<CandidateRun> {
    let labels = Dbscan::new(eps, min_samples).fit_predict(data, weights)?;
    let quality = RunQuality::from_labels(eps, &labels);
    Ok(CandidateRun { labels, quality })
}

/// The radius the selector settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub eps: f64,
    pub labels: Vec<i32>,
    pub quality: RunQuality,
    /// `false` when every candidate failed and the backstop was used.
    pub accepted: bool,
    /// Quality of every candidate tried, in schedule order.
    pub tried: Vec<RunQuality>,
}

/// Pick the largest eps whose labels pass every gate, else the smallest eps.
pub fn select(data: &[Point3], weights: &[f64], config: &SelectorConfig) -> Result<Selection> {
    config.validate()?;
    let schedule = config.schedule()?;

    info!("[Selector] Total zone-hour points: {}", data.len());
    info!(
        "[Selector] Trying eps candidates (meters): {:?}",
        schedule.as_slice()
    );

    // Evaluate lazily and stop right after the first passing candidate.
    let runs = schedule
        .as_slice()
        .iter()
        .map(|&eps| -> Result<CandidateRun> {
            let run = evaluate_candidate(data, weights, eps, config.min_samples)?;
            let q = run.quality;
            info!(
                "[Selector] eps={:.1}, clusters={}, non_noise_frac={:.3}, largest_cluster_frac={:.3}",
                eps, q.n_clusters, q.non_noise_fraction, q.largest_cluster_fraction
            );
            Ok(run)
        })
        .scan(false, |done, run| {
            if *done {
                return None;
            }
            *done = run.as_ref().map_or(true, |r| r.quality.passes(config));
            Some(run)
        })
        .collect::<Result<Vec<CandidateRun>>>()?;

    let tried: Vec<RunQuality> = runs.iter().map(|r| r.quality).collect();
    let chosen = runs
        .into_iter()
        .last()
        .ok_or_else(|| Error::Other("eps schedule exhausted without a result".into()))?;

    let accepted = chosen.quality.passes(config);
    if accepted {
        info!(
            "[Selector] --> Accepted eps={:.1} based on quality criteria",
            chosen.quality.eps
        );
    } else {
        warn!(
            "[Selector] No candidate met all gates; falling back to smallest eps={:.1}",
            chosen.quality.eps
        );
    }

    Ok(Selection {
        eps: chosen.quality.eps,
        labels: chosen.labels,
        quality: chosen.quality,
        accepted,
        tried,
    })
}
