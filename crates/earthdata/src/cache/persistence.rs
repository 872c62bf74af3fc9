use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::store::CacheEntry;

/// Most entries a snapshot may carry.
pub const PERSIST_MAX_ENTRIES: usize = 50;

/// Entries older than this are left out of the snapshot, and dropped again
/// when a snapshot is rehydrated after a restart.
pub const PERSIST_MAX_AGE_HOURS: i64 = 6;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Durable cache snapshot document.
///
/// `entries` holds `[key, entry]` pairs in access order (least recently
/// used first); `access_order` repeats the keys so a reader can rebuild
/// recency without touching entry bodies. Field names are part of the
/// on-disk format.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub entries: Vec<(String, CacheEntry)>,
    #[serde(rename = "accessOrder")]
    pub access_order: Vec<String>,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
}

/// Writes and reads cache snapshots as a single JSON file.
pub struct CachePersister {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CachePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CachePersister {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<(), SnapshotError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(snapshot)?;
        fs::write(&self.path, raw)?;
        debug!(
            "Persisted cache snapshot with {} entries to {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the snapshot, if one exists. A missing file is `Ok(None)`; a
    /// present-but-unreadable file is an error the cache treats as
    /// corruption and recovers from by starting empty.
    pub fn load(&self) -> Result<Option<CacheSnapshot>, SnapshotError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let snapshot: CacheSnapshot = serde_json::from_str(&raw)?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DataFreshness, DataKind, DataResponse, QualityAssessment, ValueStatistics,
    };
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_payload() -> DataResponse {
        let values = vec![Some(0.28)];
        DataResponse {
            kind: DataKind::SoilMoisture,
            source_id: "SMAP".to_string(),
            resolution_m: 9000,
            statistics: ValueStatistics::from_values(&values),
            values,
            quality: QualityAssessment {
                confidence: 1.0,
                issues: Vec::new(),
                is_valid: true,
            },
            educational: BTreeMap::new(),
            timestamp: Utc::now(),
            cached: false,
            freshness: DataFreshness::Live,
        }
    }

    fn sample_snapshot() -> CacheSnapshot {
        let entry = CacheEntry {
            key: "soil_moisture:37.500:127.000:2024-05-01:surface".to_string(),
            payload: sample_payload(),
            cached_at: Utc::now(),
            offline_priority: false,
        };
        CacheSnapshot {
            access_order: vec![entry.key.clone()],
            entries: vec![(entry.key.clone(), entry)],
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let persister = CachePersister::new(dir.path().join("cache.json"));

        assert!(persister.load().unwrap().is_none());

        persister.save(&sample_snapshot()).unwrap();
        let loaded = persister.load().unwrap().expect("snapshot should exist");
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.access_order, vec![loaded.entries[0].0.clone()]);
        assert_eq!(loaded.entries[0].1.payload.source_id, "SMAP");
    }

    #[test]
    fn test_snapshot_document_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let persister = CachePersister::new(&path);
        persister.save(&sample_snapshot()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("entries").unwrap().is_array());
        assert!(value.get("accessOrder").unwrap().is_array());
        assert!(value.get("savedAt").is_some());
        // each entry is a [key, entry] pair
        let first = &value["entries"][0];
        assert!(first.is_array());
        assert!(first[0].is_string());
        assert!(first[1].is_object());
    }

    #[test]
    fn test_corrupt_snapshot_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "]not json[").unwrap();

        let persister = CachePersister::new(&path);
        assert!(matches!(
            persister.load().unwrap_err(),
            SnapshotError::Parse(_)
        ));
    }
}
