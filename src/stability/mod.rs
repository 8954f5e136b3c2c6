//! Temporal stability of cluster demand.
//!
//! Three independent scores per `(cluster, metric_target)` series:
//!
//! - **DTW daily mean**: how far each day's share-of-day profile strays from
//!   the average day (lower is steadier).
//! - **Autocorrelation** at lag 1 (hour to hour persistence) and lag 24
//!   (same hour next day).
//! - **Hourly SNR**: variance explained by hour of day over what is left.
//!
//! A metric that cannot be computed for one cluster is reported missing
//! (`None`) for that cluster only.

mod autocorr;
mod dtw;
mod snr;

pub use autocorr::autocorrelation;
pub use dtw::{day_hour_matrix, dtw_daily_mean, dtw_distance, HOURS_PER_DAY};
pub use snr::{sample_variance, snr_hourly};

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::{Deserialize, Serialize};

use crate::timeseries::{ClusterSeries, MetricTarget, SeriesPoint};

/// Stability scores of one cluster series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    pub cluster_id: i32,
    pub metric_target: MetricTarget,
    pub n_points: usize,
    #[serde(default, with = "metric_value")]
    pub dtw_daily_mean: Option<f64>,
    #[serde(default, with = "metric_value")]
    pub autocorr_lag1: Option<f64>,
    #[serde(default, with = "metric_value")]
    pub autocorr_lag24: Option<f64>,
    #[serde(default, with = "metric_value")]
    pub snr_hourly: Option<f64>,
}

/// Per-target means over clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub metric_target: MetricTarget,
    /// Distinct clusters scored.
    pub clusters: usize,
    #[serde(default, with = "metric_value")]
    pub dtw_daily_mean: Option<f64>,
    #[serde(default, with = "metric_value")]
    pub autocorr_lag1: Option<f64>,
    #[serde(default, with = "metric_value")]
    pub autocorr_lag24: Option<f64>,
    #[serde(default, with = "metric_value")]
    pub snr_hourly: Option<f64>,
}

/// Score one timestamp-sorted cluster series.
pub fn cluster_metrics(
    cluster_id: i32,
    metric_target: MetricTarget,
    points: &[SeriesPoint],
) -> ClusterMetrics {
    debug_assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let hours: Vec<u8> = points.iter().map(|p| p.hour).collect();

    ClusterMetrics {
        cluster_id,
        metric_target,
        n_points: points.len(),
        dtw_daily_mean: dtw_daily_mean(points),
        autocorr_lag1: autocorrelation(&values, 1),
        autocorr_lag24: autocorrelation(&values, 24),
        snr_hourly: snr_hourly(&values, &hours),
    }
}

/// Score every series, ordered by `(metric_target, cluster_id)`.
pub fn compute_metrics(series: &ClusterSeries) -> Vec<ClusterMetrics> {
    let metrics: Vec<ClusterMetrics> = series
        .groups()
        .map(|(cluster_id, target, points)| cluster_metrics(cluster_id, target, points))
        .collect();
    info!("[Stability] Scored {} cluster series", metrics.len());
    metrics
}

fn mean_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Average each metric across clusters, per metric target. Missing values are skipped.
pub fn summarize(metrics: &[ClusterMetrics]) -> Vec<MetricsSummary> {
    let mut by_target: BTreeMap<MetricTarget, Vec<&ClusterMetrics>> = BTreeMap::new();
    for m in metrics {
        by_target.entry(m.metric_target).or_default().push(m);
    }

    by_target
        .into_iter()
        .map(|(metric_target, group)| MetricsSummary {
            metric_target,
            clusters: group
                .iter()
                .map(|m| m.cluster_id)
                .collect::<BTreeSet<_>>()
                .len(),
            dtw_daily_mean: mean_present(group.iter().map(|m| m.dtw_daily_mean)),
            autocorr_lag1: mean_present(group.iter().map(|m| m.autocorr_lag1)),
            autocorr_lag24: mean_present(group.iter().map(|m| m.autocorr_lag24)),
            snr_hourly: mean_present(group.iter().map(|m| m.snr_hourly)),
        })
        .collect()
}

/// JSON has no infinity: `+∞` is written as `"inf"`, missing as `null`.
mod metric_value {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) if v.is_infinite() => s.serialize_str(if *v > 0.0 { "inf" } else { "-inf" }),
            Some(v) if v.is_nan() => s.serialize_none(),
            Some(v) => s.serialize_f64(*v),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(d)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(t)) => match t.as_str() {
                "inf" => Ok(Some(f64::INFINITY)),
                "-inf" => Ok(Some(f64::NEG_INFINITY)),
                other => Err(serde::de::Error::custom(format!(
                    "invalid metric value {other:?}"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metrics(cluster_id: i32, target: MetricTarget, dtw: Option<f64>) -> ClusterMetrics {
        ClusterMetrics {
            cluster_id,
            metric_target: target,
            n_points: 10,
            dtw_daily_mean: dtw,
            autocorr_lag1: Some(0.5),
            autocorr_lag24: None,
            snr_hourly: Some(f64::INFINITY),
        }
    }

    #[test]
    fn summary_skips_missing_values() {
        let all = vec![
            metrics(0, MetricTarget::Count, Some(0.2)),
            metrics(1, MetricTarget::Count, None),
            metrics(2, MetricTarget::Count, Some(0.4)),
            metrics(0, MetricTarget::Value, Some(1.0)),
        ];
        let summary = summarize(&all);
        assert_eq!(summary.len(), 2);

        let counts = &summary[0];
        assert_eq!(counts.metric_target, MetricTarget::Count);
        assert_eq!(counts.clusters, 3);
        assert!((counts.dtw_daily_mean.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(counts.autocorr_lag24, None);
        assert_eq!(counts.snr_hourly, Some(f64::INFINITY));
        assert_eq!(summary[1].clusters, 1);
    }

    #[test]
    fn infinity_survives_json() {
        let m = metrics(3, MetricTarget::Count, None);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains(r#""snr_hourly":"inf""#));
        assert!(json.contains(r#""dtw_daily_mean":null"#));
        let back: ClusterMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn short_series_degrades_to_missing() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(5, 0, 0))
            .unwrap();
        let points = vec![SeriesPoint {
            cluster_id: 9,
            timestamp: ts,
            hour: 5,
            value: 3.0,
            metric_target: MetricTarget::Count,
        }];
        let m = cluster_metrics(9, MetricTarget::Count, &points);
        assert_eq!(m.n_points, 1);
        assert_eq!(m.dtw_daily_mean, None);
        assert_eq!(m.autocorr_lag1, None);
        assert_eq!(m.autocorr_lag24, None);
        assert_eq!(m.snr_hourly, None);
    }
}
