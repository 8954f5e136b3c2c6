use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::{debug, info, warn};

use super::{ClusterSeries, DailyCache, DailyZoneHour, MetricTarget, SeriesPoint, TripEvent};
use crate::assignment::AssignmentTable;
use crate::error::{Error, Result};

/// Roll trips up per `(date, hour, origin zone)`, ordered by that key.
pub fn build_daily(trips: &[TripEvent], include_value: bool) -> Vec<DailyZoneHour> {
    let mut acc: BTreeMap<(NaiveDate, u8, i64), (u64, f64)> = BTreeMap::new();
    for trip in trips {
        let ts = trip.pickup_datetime;
        let entry = acc
            .entry((ts.date(), ts.hour() as u8, trip.origin_location_id))
            .or_insert((0, 0.0));
        entry.0 += 1;
        if include_value {
            entry.1 += trip.fares.total();
        }
    }

    acc.into_iter()
        .map(|((date, hour, location_id), (trip_count, value))| DailyZoneHour {
            date,
            hour,
            location_id,
            trip_count,
            total_value: include_value.then_some(value),
        })
        .collect()
}

/// Reuse the cached daily table under `key`, or build it from `trips` and store it.
///
/// `trips` is only called on a cache miss.
pub fn load_or_build_daily<C, F>(
    cache: &mut C,
    key: &str,
    include_value: bool,
    trips: F,
) -> Result<Vec<DailyZoneHour>>
where
    C: DailyCache + ?Sized,
    F: FnOnce() -> Result<Vec<TripEvent>>,
{
    if cache.exists(key) {
        info!("[Daily] Reusing cache: {}", key);
        return cache.read(key);
    }

    info!("[Daily] Building daily cache (date x hour x zone) for {}", key);
    let trips = trips()?;
    let rows = build_daily(&trips, include_value);
    cache.write(key, &rows)?;
    info!(
        "[Daily] Saved cache {}: {} rows from {} trips",
        key,
        rows.len(),
        trips.len()
    );
    Ok(rows)
}

/// Join the daily table to the assignments and sum per cluster and timestamp.
///
/// Zone-hours without a non-noise assignment are excluded. A value series is
/// produced only when `include_value` is set and the daily table carries
/// monetary totals.
pub fn aggregate(
    daily: &[DailyZoneHour],
    assignments: &AssignmentTable,
    include_value: bool,
) -> Result<ClusterSeries> {
    let lookup = assignments.cluster_lookup();
    let with_value = include_value && daily.iter().any(|r| r.total_value.is_some());
    if include_value && !with_value {
        warn!("[Aggregate] Daily table has no monetary totals; skipping value series");
    }

    let mut acc: BTreeMap<(MetricTarget, i32, NaiveDateTime), (u8, f64)> = BTreeMap::new();
    let mut joined = 0usize;

    for (row, r) in daily.iter().enumerate() {
        let Some(&cluster_id) = lookup.get(&(r.location_id, r.hour)) else {
            continue;
        };
        let timestamp = r
            .date
            .and_hms_opt(u32::from(r.hour), 0, 0)
            .ok_or_else(|| Error::InvalidRecord {
                table: "daily",
                row,
                message: format!("hour {} out of range", r.hour),
            })?;
        joined += 1;

        acc.entry((MetricTarget::Count, cluster_id, timestamp))
            .or_insert((r.hour, 0.0))
            .1 += r.trip_count as f64;
        if with_value {
            acc.entry((MetricTarget::Value, cluster_id, timestamp))
                .or_insert((r.hour, 0.0))
                .1 += r.total_value.unwrap_or(0.0);
        }
    }

    debug!(
        "[Aggregate] {} of {} daily rows joined to a cluster",
        joined,
        daily.len()
    );

    let points = acc
        .into_iter()
        .map(
            |((metric_target, cluster_id, timestamp), (hour, value))| SeriesPoint {
                cluster_id,
                timestamp,
                hour,
                value,
                metric_target,
            },
        )
        .collect();
    let series = ClusterSeries::new(points);
    info!("[Aggregate] Cluster time series: {} points", series.len());
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::ClusterAssignment;
    use crate::timeseries::{FareComponents, MemoryCache};

    fn trip(day: u32, hour: u32, zone: i64, fare: f64) -> TripEvent {
        TripEvent {
            pickup_datetime: NaiveDate::from_ymd_opt(2024, 5, day)
                .and_then(|d| d.and_hms_opt(hour, 30, 0))
                .unwrap(),
            origin_location_id: zone,
            destination_location_id: None,
            trip_time: None,
            fares: FareComponents {
                base_passenger_fare: Some(fare),
                ..Default::default()
            },
        }
    }

    fn assign(location_id: i64, hour: u8, cluster_id: i32) -> ClusterAssignment {
        ClusterAssignment {
            location_id,
            hour,
            cluster_id,
            weight: 1.0,
        }
    }

    #[test]
    fn daily_rollup_counts_and_sums() {
        let trips = vec![
            trip(1, 8, 10, 5.0),
            trip(1, 8, 10, 7.0),
            trip(1, 9, 10, 1.0),
            trip(2, 8, 11, 2.0),
        ];
        let daily = build_daily(&trips, true);
        assert_eq!(daily.len(), 3);
        assert_eq!(daily[0].trip_count, 2);
        assert_eq!(daily[0].total_value, Some(12.0));

        let counts_only = build_daily(&trips, false);
        assert!(counts_only.iter().all(|r| r.total_value.is_none()));
    }

    #[test]
    fn cached_rows_are_reused_without_loading_trips() {
        let mut cache = MemoryCache::new();
        let first = load_or_build_daily(&mut cache, "k", false, || Ok(vec![trip(1, 8, 10, 1.0)]))
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = load_or_build_daily(&mut cache, "k", false, || {
            Err(Error::Other("trips must not be read on a cache hit".into()))
        })
        .unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn aggregate_sums_zones_and_drops_unassigned() {
        let trips = vec![
            trip(1, 8, 10, 5.0),
            trip(1, 8, 11, 3.0),
            trip(1, 8, 12, 100.0), // noise zone-hour
            trip(1, 8, 13, 100.0), // never assigned
            trip(1, 9, 10, 2.0),
        ];
        let daily = build_daily(&trips, true);
        let table = AssignmentTable::from_rows(vec![
            assign(10, 8, 4),
            assign(11, 8, 4),
            assign(12, 8, -1),
            assign(10, 9, 4),
        ]);

        let series = aggregate(&daily, &table, true).unwrap();
        let groups: Vec<_> = series.groups().collect();
        assert_eq!(groups.len(), 2);

        let (cluster, target, counts) = groups[0];
        assert_eq!((cluster, target), (4, MetricTarget::Count));
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].value, 2.0);
        assert_eq!(counts[0].hour, 8);
        assert_eq!(counts[1].value, 1.0);

        let (_, target, values) = groups[1];
        assert_eq!(target, MetricTarget::Value);
        assert_eq!(values[0].value, 8.0);
    }

    #[test]
    fn value_series_needs_monetary_totals() {
        let daily = build_daily(&[trip(1, 8, 10, 5.0)], false);
        let table = AssignmentTable::from_rows(vec![assign(10, 8, 0)]);
        let series = aggregate(&daily, &table, true).unwrap();
        assert!(series
            .points()
            .iter()
            .all(|p| p.metric_target == MetricTarget::Count));
    }
}
