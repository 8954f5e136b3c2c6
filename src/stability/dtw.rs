//! Daily-profile shape distance.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::timeseries::SeriesPoint;

pub const HOURS_PER_DAY: usize = 24;

/// L1 dynamic time warping distance, divided by `a.len() + b.len()`.
///
/// `cost(i, j) = |a_i − b_j| + min(cost(i−1, j), cost(i, j−1), cost(i−1, j−1))`.
/// Two empty inputs are 0 apart; one empty input is infinitely far.
pub fn dtw_distance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    let m = b.len();
    if n == 0 && m == 0 {
        return 0.0;
    }

    let mut dtw = vec![vec![f64::INFINITY; m + 1]; n + 1];
    dtw[0][0] = 0.0;

    for i in 1..=n {
        let ai = a[i - 1];
        for j in 1..=m {
            let cost = (ai - b[j - 1]).abs();
            dtw[i][j] = cost + dtw[i - 1][j].min(dtw[i][j - 1]).min(dtw[i - 1][j - 1]);
        }
    }

    dtw[n][m] / (n + m) as f64
}

/// Pivot a series into one 24-hour row per day, summing repeated hours.
pub fn day_hour_matrix(points: &[SeriesPoint]) -> BTreeMap<NaiveDate, [f64; HOURS_PER_DAY]> {
    let mut days: BTreeMap<NaiveDate, [f64; HOURS_PER_DAY]> = BTreeMap::new();
    for p in points {
        let h = usize::from(p.hour);
        if h < HOURS_PER_DAY {
            days.entry(p.timestamp.date()).or_insert([0.0; HOURS_PER_DAY])[h] += p.value;
        }
    }
    days
}

/// Mean DTW distance between each day's share-of-day profile and the mean profile.
///
/// `None` when fewer than two distinct days are present.
pub fn dtw_daily_mean(points: &[SeriesPoint]) -> Option<f64> {
    let days = day_hour_matrix(points);
    if days.len() < 2 {
        return None;
    }

    let profiles: Vec<[f64; HOURS_PER_DAY]> = days
        .into_values()
        .map(|mut row| {
            let sum: f64 = row.iter().sum();
            let sum = if sum == 0.0 { 1.0 } else { sum };
            row.iter_mut().for_each(|v| *v /= sum);
            row
        })
        .collect();

    let n_days = profiles.len() as f64;
    let mut mean = [0.0; HOURS_PER_DAY];
    for row in &profiles {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v / n_days;
        }
    }

    let total: f64 = profiles.iter().map(|row| dtw_distance(row, &mean)).sum();
    Some(total / n_days)
}
