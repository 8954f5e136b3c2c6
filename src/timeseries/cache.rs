use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::DailyZoneHour;
use crate::error::Result;

/// Memoization store for the daily `(date, hour, zone)` table.
///
/// Entries are never validated against newer raw data: if a key exists its
/// rows are used as-is. Keeping the cache fresh is the caller's job.
pub trait DailyCache {
    fn exists(&self, key: &str) -> bool;
    fn read(&self, key: &str) -> Result<Vec<DailyZoneHour>>;
    fn write(&mut self, key: &str, rows: &[DailyZoneHour]) -> Result<()>;
}

/// In-process cache, mainly for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Vec<DailyZoneHour>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DailyCache for MemoryCache {
    fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn read(&self, key: &str) -> Result<Vec<DailyZoneHour>> {
        Ok(self.entries.get(key).cloned().unwrap_or_default())
    }

    fn write(&mut self, key: &str, rows: &[DailyZoneHour]) -> Result<()> {
        self.entries.insert(key.to_string(), rows.to_vec());
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl DailyCache for JsonFileCache {
    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn read(&self, key: &str) -> Result<Vec<DailyZoneHour>> {
        let file = File::open(self.path_for(key))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn write(&mut self, key: &str, rows: &[DailyZoneHour]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut writer = BufWriter::new(File::create(self.path_for(key))?);
        serde_json::to_writer(&mut writer, rows)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rows() -> Vec<DailyZoneHour> {
        vec![DailyZoneHour {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            hour: 7,
            location_id: 42,
            trip_count: 9,
            total_value: Some(120.5),
        }]
    }

    #[test]
    fn memory_cache_roundtrip() {
        let mut cache = MemoryCache::new();
        assert!(!cache.exists("daily"));
        cache.write("daily", &rows()).unwrap();
        assert!(cache.exists("daily"));
        assert_eq!(cache.read("daily").unwrap(), rows());
    }

    #[test]
    fn file_cache_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = JsonFileCache::new(tmp.path().join("nested"));
        assert!(!cache.exists("daily"));
        cache.write("daily", &rows()).unwrap();
        assert!(cache.path_for("daily").is_file());
        assert_eq!(cache.read("daily").unwrap(), rows());
    }
}
