use std::collections::HashMap;

/// Sample variance (`ddof = 1`); `None` below two values.
pub fn sample_variance(x: &[f64]) -> Option<f64> {
    if x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    Some(x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0))
}

/// Hour-of-day signal-to-noise ratio.
///
/// The signal replaces each value by the mean of its hour-of-day group; the
/// residual is what remains. Returns `var(signal) / var(residual)`, `+∞` when
/// the residual is flat (or undefined) but the signal is not, and `None` when
/// neither varies or the series is constant.
pub fn snr_hourly(values: &[f64], hours: &[u8]) -> Option<f64> {
    debug_assert_eq!(values.len(), hours.len());
    if values.iter().all(|v| *v == values[0]) {
        return None;
    }

    // Means are accumulated as offsets from each group's first value, so a
    // group of identical values has exactly that value as its mean.
    let mut groups: HashMap<u8, (f64, f64, usize)> = HashMap::new();
    for (&v, &h) in values.iter().zip(hours) {
        let g = groups.entry(h).or_insert((v, 0.0, 0));
        g.1 += v - g.0;
        g.2 += 1;
    }

    let signal: Vec<f64> = hours
        .iter()
        .map(|h| {
            groups
                .get(h)
                .map_or(0.0, |(first, offset, n)| first + offset / *n as f64)
        })
        .collect();
    let residual: Vec<f64> = values.iter().zip(&signal).map(|(v, s)| v - s).collect();

    let v_sig = sample_variance(&signal).unwrap_or(0.0);
    match sample_variance(&residual) {
        Some(v_res) if v_res > 0.0 => Some(v_sig / v_res),
        _ if v_sig > 0.0 => Some(f64::INFINITY),
        _ => None,
    }
}
