//! The two batch stages end to end.
//!
//! [`run_clustering`] turns zone-hour intensities into a frozen assignment
//! table. [`run_stability`] takes that table back, joins it to trip history
//! and scores every cluster series. The stages share nothing but the
//! assignment table, so they can run in separate processes.

use log::info;
use serde::{Deserialize, Serialize};

use crate::assignment::AssignmentTable;
use crate::cluster::{purify, select, DemotedCluster, RunQuality};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::features::{build_features, ZoneCoordinates, ZoneHourIntensity};
use crate::stability::{compute_metrics, summarize, ClusterMetrics, MetricsSummary};
use crate::timeseries::{aggregate, load_or_build_daily, ClusterSeries, DailyCache, TripEvent};

/// Result of the clustering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringOutput {
    pub assignments: AssignmentTable,
    /// Radius the selector settled on.
    pub eps: f64,
    /// `false` when the selector fell back to its smallest radius.
    pub accepted: bool,
    /// Quality of the chosen run, before purification.
    pub quality: RunQuality,
    pub tried: Vec<RunQuality>,
    pub demoted: Vec<DemotedCluster>,
}

/// Result of the stability stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityOutput {
    pub series: ClusterSeries,
    pub metrics: Vec<ClusterMetrics>,
    pub summary: Vec<MetricsSummary>,
}

/// Features, adaptive eps selection, then purification.
pub fn run_clustering(
    records: &[ZoneHourIntensity],
    coords: &ZoneCoordinates,
    config: &PipelineConfig,
) -> Result<ClusteringOutput> {
    config.validate()?;

    let features = build_features(records, coords, config.time_scale)?;
    if features.is_empty() {
        return Err(Error::EmptyInput);
    }
    info!(
        "[Pipeline] {} zone-hour points from {} intensity records",
        features.len(),
        records.len()
    );

    let selection = select(&features.matrix, &features.weights, &config.selector)?;
    let purified = purify(
        selection.labels,
        config.selector.max_largest_cluster_fraction,
    );
    let assignments = AssignmentTable::from_labels(&features.points, &purified.labels)?;

    info!(
        "[Pipeline] eps={:.1} ({}), {} clusters after purification",
        selection.eps,
        if selection.accepted { "accepted" } else { "fallback" },
        assignments.cluster_ids().len()
    );

    Ok(ClusteringOutput {
        assignments,
        eps: selection.eps,
        accepted: selection.accepted,
        quality: selection.quality,
        tried: selection.tried,
        demoted: purified.demoted,
    })
}

/// Daily table (cached), per-cluster series, then metrics and their summary.
///
/// `trips` is only called when the cache has no entry for `config.cache_key`.
pub fn run_stability<C, F>(
    assignments: &AssignmentTable,
    cache: &mut C,
    trips: F,
    config: &PipelineConfig,
) -> Result<StabilityOutput>
where
    C: DailyCache + ?Sized,
    F: FnOnce() -> Result<Vec<TripEvent>>,
{
    config.validate()?;

    let daily = load_or_build_daily(cache, &config.cache_key, config.include_value, trips)?;
    let series = aggregate(&daily, assignments, config.include_value)?;
    let metrics = compute_metrics(&series);
    let summary = summarize(&metrics);

    for s in &summary {
        info!(
            "[Pipeline] {}: {} clusters, dtw={:?}, ac1={:?}, ac24={:?}, snr={:?}",
            s.metric_target,
            s.clusters,
            s.dtw_daily_mean,
            s.autocorr_lag1,
            s.autocorr_lag24,
            s.snr_hourly
        );
    }

    Ok(StabilityOutput {
        series,
        metrics,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ZoneCoordinate;
    use crate::timeseries::MemoryCache;

    #[test]
    fn empty_features_are_an_error() {
        let coords = ZoneCoordinates::default();
        let records = [ZoneHourIntensity {
            location_id: 1,
            hour: 0,
            intensity: 5.0,
        }];
        assert!(matches!(
            run_clustering(&records, &coords, &PipelineConfig::default()),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn single_dense_zone_hour_is_one_cluster() {
        let coords: ZoneCoordinates = [ZoneCoordinate {
            location_id: 1,
            x_meters: 0.0,
            y_meters: 0.0,
        }]
        .into_iter()
        .collect();
        let records = [ZoneHourIntensity {
            location_id: 1,
            hour: 12,
            intensity: 100.0,
        }];

        let out = run_clustering(&records, &coords, &PipelineConfig::default()).unwrap();
        assert!(!out.accepted);
        assert_eq!(out.assignments.cluster_of(1, 12), Some(0));
        assert!(out.demoted.is_empty());
    }

    #[test]
    fn stability_without_assignments_is_empty() {
        let mut cache = MemoryCache::new();
        let out = run_stability(
            &AssignmentTable::default(),
            &mut cache,
            || Ok(Vec::new()),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert!(out.series.is_empty());
        assert!(out.metrics.is_empty());
        assert!(out.summary.is_empty());
    }
}
