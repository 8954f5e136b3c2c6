//! The zone-hour → cluster table produced by the clustering stage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cluster::NOISE;
use crate::error::{Error, Result};
use crate::features::ZoneHourPoint;
use crate::schema;

/// Cluster label of one zone-hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub location_id: i64,
    pub hour: u8,
    /// `-1` for noise.
    pub cluster_id: i32,
    /// Intensity the zone-hour contributed to clustering.
    #[serde(default)]
    pub weight: f64,
}

impl ClusterAssignment {
    pub fn is_noise(&self) -> bool {
        self.cluster_id == NOISE
    }
}

/// Assignments keyed uniquely by `(location_id, hour)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ClusterAssignment>", into = "Vec<ClusterAssignment>")]
pub struct AssignmentTable {
    rows: Vec<ClusterAssignment>,
    index: HashMap<(i64, u8), usize>,
}

impl From<Vec<ClusterAssignment>> for AssignmentTable {
    fn from(rows: Vec<ClusterAssignment>) -> Self {
        Self::from_rows(rows)
    }
}

impl From<AssignmentTable> for Vec<ClusterAssignment> {
    fn from(table: AssignmentTable) -> Self {
        table.rows
    }
}

/// A zone-hour of the observed universe and its label, if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniverseRow {
    pub location_id: i64,
    pub hour: u8,
    pub cluster_id: Option<i32>,
}

impl AssignmentTable {
    /// Build from rows, keeping the first row for each `(location_id, hour)`.
    pub fn from_rows(rows: Vec<ClusterAssignment>) -> Self {
        let (rows, _) = schema::dedup_first_wins(rows, |r| (r.location_id, r.hour));
        let index = rows
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.location_id, r.hour), i))
            .collect();
        Self { rows, index }
    }

    /// Pair clustered points with their labels.
    pub fn from_labels(points: &[ZoneHourPoint], labels: &[i32]) -> Result<Self> {
        if points.len() != labels.len() {
            return Err(Error::DimensionMismatch {
                expected: points.len(),
                found: labels.len(),
            });
        }
        let rows = points
            .iter()
            .zip(labels)
            .map(|(p, &cluster_id)| ClusterAssignment {
                location_id: p.location_id,
                hour: p.hour,
                cluster_id,
                weight: p.weight,
            })
            .collect();
        Ok(Self::from_rows(rows))
    }

    pub fn rows(&self) -> &[ClusterAssignment] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Label of a zone-hour, noise included.
    pub fn cluster_of(&self, location_id: i64, hour: u8) -> Option<i32> {
        self.index
            .get(&(location_id, hour))
            .map(|&i| self.rows[i].cluster_id)
    }

    /// `(location_id, hour) → cluster_id` for non-noise rows only.
    pub fn cluster_lookup(&self) -> HashMap<(i64, u8), i32> {
        self.rows
            .iter()
            .filter(|r| !r.is_noise())
            .map(|r| ((r.location_id, r.hour), r.cluster_id))
            .collect()
    }

    /// Distinct non-noise cluster ids, ascending.
    pub fn cluster_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .rows
            .iter()
            .filter(|r| !r.is_noise())
            .map(|r| r.cluster_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Left-join every observed zone-hour to its label.
    ///
    /// Zone-hours that never reached clustering get `None`; duplicates in
    /// `universe` collapse to their first occurrence.
    pub fn expand_to_universe(
        &self,
        universe: impl IntoIterator<Item = (i64, u8)>,
    ) -> Vec<UniverseRow> {
        let (keys, _) = schema::dedup_first_wins(universe.into_iter().collect(), |k| *k);
        keys.into_iter()
            .map(|(location_id, hour)| UniverseRow {
                location_id,
                hour,
                cluster_id: self.cluster_of(location_id, hour),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(location_id: i64, hour: u8, cluster_id: i32) -> ClusterAssignment {
        ClusterAssignment {
            location_id,
            hour,
            cluster_id,
            weight: 1.0,
        }
    }

    #[test]
    fn duplicate_keys_keep_first() {
        let table = AssignmentTable::from_rows(vec![row(1, 8, 0), row(2, 8, 1), row(1, 8, 5)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cluster_of(1, 8), Some(0));
        assert_eq!(table.cluster_of(2, 8), Some(1));
        assert_eq!(table.cluster_of(2, 9), None);
    }

    #[test]
    fn decoded_table_is_indexed() {
        let json = r#"[
            {"location_id": 1, "hour": 8, "cluster_id": 3},
            {"location_id": 1, "hour": 8, "cluster_id": 9},
            {"location_id": 5, "hour": 0, "cluster_id": -1}
        ]"#;
        let table: AssignmentTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cluster_of(1, 8), Some(3));
        assert_eq!(table.cluster_of(5, 0), Some(-1));
    }

    #[test]
    fn lookup_excludes_noise() {
        let table = AssignmentTable::from_rows(vec![row(1, 8, 0), row(2, 8, -1), row(3, 9, 2)]);
        let lookup = table.cluster_lookup();
        assert_eq!(lookup.len(), 2);
        assert!(!lookup.contains_key(&(2, 8)));
        assert_eq!(table.cluster_ids(), vec![0, 2]);
    }

    #[test]
    fn universe_left_join() {
        let table = AssignmentTable::from_rows(vec![row(1, 8, 0), row(2, 8, -1)]);
        let out = table.expand_to_universe(vec![(1, 8), (2, 8), (3, 8), (1, 8)]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].cluster_id, Some(0));
        assert_eq!(out[1].cluster_id, Some(-1));
        assert_eq!(out[2].cluster_id, None);
    }

    #[test]
    fn label_count_must_match() {
        assert!(AssignmentTable::from_labels(&[], &[0]).is_err());
    }

    #[test]
    fn weight_column_is_optional() {
        let json = r#"[{"location_id": 4, "hour": 2, "cluster_id": 1}]"#;
        let rows: Vec<ClusterAssignment> =
            schema::parse_table("assignments", json, schema::ASSIGNMENT_COLUMNS).unwrap();
        assert_eq!(rows[0].weight, 0.0);
    }
}
