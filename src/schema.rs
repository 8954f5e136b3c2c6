//! Boundary checks for tabular inputs.
//!
//! Tables arrive as JSON arrays of flat objects. Required columns are checked
//! on every row before any record is decoded, so a malformed input fails
//! before the pipeline does any work.

use std::collections::HashSet;
use std::hash::Hash;

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

pub const INTENSITY_COLUMNS: &[&str] = &["location_id", "hour", "intensity"];
pub const COORDINATE_COLUMNS: &[&str] = &["location_id", "x_meters", "y_meters"];
pub const TRIP_COLUMNS: &[&str] = &["pickup_datetime", "origin_location_id"];
pub const FLOW_TRIP_COLUMNS: &[&str] = &[
    "pickup_datetime",
    "origin_location_id",
    "destination_location_id",
];
pub const ASSIGNMENT_COLUMNS: &[&str] = &["location_id", "hour", "cluster_id"];

/// Fail with [`Error::MissingColumn`] if any row lacks a required column.
pub fn require_columns(
    table: &'static str,
    rows: &[Value],
    columns: &'static [&'static str],
) -> Result<()> {
    for (row, value) in rows.iter().enumerate() {
        let object = value.as_object().ok_or_else(|| Error::InvalidRecord {
            table,
            row,
            message: "expected a JSON object".into(),
        })?;
        if let Some(column) = columns.iter().copied().find(|c| !object.contains_key(*c)) {
            return Err(Error::MissingColumn { table, column });
        }
    }
    Ok(())
}

/// Parse a JSON array into records after validating its columns.
pub fn parse_table<T: DeserializeOwned>(
    table: &'static str,
    json: &str,
    columns: &'static [&'static str],
) -> Result<Vec<T>> {
    let rows = match serde_json::from_str::<Value>(json)? {
        Value::Array(rows) => rows,
        _ => {
            return Err(Error::InvalidRecord {
                table,
                row: 0,
                message: "expected a JSON array of records".into(),
            })
        }
    };
    require_columns(table, &rows, columns)?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Error::from))
        .collect()
}

/// Keep the first row for every key. Returns the survivors and the drop count.
pub fn dedup_first_wins<T, K, F>(rows: Vec<T>, key: F) -> (Vec<T>, usize)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let before = rows.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<T> = rows.into_iter().filter(|r| seen.insert(key(r))).collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        warn!("[Schema] Dropped {} duplicated key rows (first occurrence kept)", dropped);
    }
    (kept, dropped)
}
