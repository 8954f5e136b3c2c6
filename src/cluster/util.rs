use std::collections::BTreeMap;

use super::dbscan::NOISE;

#[inline]
pub(crate) fn squared_euclidean<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Point count per non-noise label, ordered by label.
pub(crate) fn cluster_sizes(labels: &[i32]) -> BTreeMap<i32, usize> {
    let mut sizes = BTreeMap::new();
    for &l in labels.iter().filter(|&&l| l != NOISE) {
        *sizes.entry(l).or_insert(0) += 1;
    }
    sizes
}

/// Largest non-noise cluster as `(label, size)`; ties go to the smaller label.
pub(crate) fn largest_cluster(sizes: &BTreeMap<i32, usize>) -> Option<(i32, usize)> {
    let mut best: Option<(i32, usize)> = None;
    for (&label, &size) in sizes {
        match best {
            Some((_, s)) if s >= size => {}
            _ => best = Some((label, size)),
        }
    }
    best
}
