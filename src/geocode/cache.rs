// src/geocode/cache.rs
//! Bounded hint → coordinate cache shared by all workers of a run, with an
//! optional JSON snapshot on disk so lookups survive across runs.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::PersistenceError;
use crate::model::GeoPoint;
use crate::store::write_atomically;

pub const DEFAULT_CACHE_CAPACITY: usize = 50_000;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, GeoPoint>,
    // Insertion order; front is the oldest entry.
    order: VecDeque<String>,
}

/// Keys are normalized hints (see `normalize_hint`).
///
/// Eviction is oldest-inserted first. An existing entry is never replaced:
/// the first coordinate stored for a hint stays until it is evicted.
#[derive(Debug)]
pub struct LocationCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
    path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    hint: String,
    lon: f64,
    lat: f64,
}

impl LocationCache {
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity: capacity.max(1),
            path: None,
        }
    }

    /// Load the snapshot at `path`. A missing file gives an empty cache; an
    /// unreadable or malformed one is logged and also gives an empty cache.
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut cache = Self::in_memory(capacity);
        match read_snapshot(&path) {
            Ok(Some(entries)) => {
                let total = entries.len();
                let mut skipped = 0usize;
                for e in entries {
                    match GeoPoint::new(e.lon, e.lat) {
                        Ok(p) if !e.hint.trim().is_empty() => {
                            cache.insert(e.hint, p);
                        }
                        _ => skipped += 1,
                    }
                }
                info!(
                    path = %path.display(),
                    loaded = cache.len(),
                    skipped,
                    total,
                    "geocode cache loaded"
                );
            }
            Ok(None) => debug!(path = %path.display(), "no geocode cache snapshot yet"),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "geocode cache snapshot unusable; starting empty"
            ),
        }
        cache.path = Some(path);
        cache
    }

    pub fn get(&self, key: &str) -> Option<GeoPoint> {
        self.inner.read().entries.get(key).copied()
    }

    /// Returns `false` when the key was already present (value kept).
    pub fn insert(&self, key: String, point: GeoPoint) -> bool {
        let mut g = self.inner.write();
        if g.entries.contains_key(&key) {
            return false;
        }
        g.entries.insert(key.clone(), point);
        g.order.push_back(key);
        while g.order.len() > self.capacity {
            if let Some(oldest) = g.order.pop_front() {
                g.entries.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Entries oldest first.
    pub fn snapshot(&self) -> Vec<(String, GeoPoint)> {
        let g = self.inner.read();
        g.order
            .iter()
            .filter_map(|k| g.entries.get(k).map(|p| (k.clone(), *p)))
            .collect()
    }

    /// Write the snapshot to the path given at load time; no-op for an
    /// in-memory cache.
    pub fn save(&self) -> Result<(), PersistenceError> {
        match &self.path {
            Some(p) => self.save_to(p),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PersistenceError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries: self
                .snapshot()
                .into_iter()
                .map(|(hint, p)| SnapshotEntry {
                    hint,
                    lon: p.lon(),
                    lat: p.lat(),
                })
                .collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;
        write_atomically(path, &bytes)
    }
}

fn read_snapshot(path: &Path) -> io::Result<Option<Vec<SnapshotEntry>>> {
    let data = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let snap: Snapshot = serde_json::from_str(&data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if snap.version != SNAPSHOT_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported snapshot version {}", snap.version),
        ));
    }
    Ok(Some(snap.entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).unwrap()
    }

    #[test]
    fn evicts_oldest_inserted_first() {
        let c = LocationCache::in_memory(2);
        c.insert("a".into(), pt(1.0, 1.0));
        c.insert("b".into(), pt(2.0, 2.0));
        // Reads do not refresh position.
        assert!(c.get("a").is_some());
        c.insert("c".into(), pt(3.0, 3.0));
        assert!(c.get("a").is_none());
        assert!(c.get("b").is_some());
        assert!(c.get("c").is_some());
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn existing_entry_is_not_overwritten() {
        let c = LocationCache::in_memory(10);
        assert!(c.insert("madrid".into(), pt(-3.7, 40.4)));
        assert!(!c.insert("madrid".into(), pt(0.0, 0.0)));
        assert_eq!(c.get("madrid"), Some(pt(-3.7, 40.4)));
    }

    #[test]
    fn snapshot_survives_reload_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("geocode.json");

        let c = LocationCache::load(&path, 10);
        assert!(c.is_empty());
        c.insert("lisbon".into(), pt(-9.14, 38.72));
        c.insert("porto".into(), pt(-8.61, 41.15));
        c.save().unwrap();

        let reloaded = LocationCache::load(&path, 10);
        assert_eq!(reloaded.snapshot(), c.snapshot());

        // Smaller capacity keeps the newest entries.
        let small = LocationCache::load(&path, 1);
        assert_eq!(small.snapshot(), vec![("porto".to_string(), pt(-8.61, 41.15))]);
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode.json");
        fs::write(&path, "{ not json").unwrap();
        let c = LocationCache::load(&path, 10);
        assert!(c.is_empty());
        assert_eq!(c.path(), Some(path.as_path()));
    }

    #[test]
    fn out_of_range_snapshot_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode.json");
        fs::write(
            &path,
            r#"{"version":1,"entries":[{"hint":"ok","lon":1.0,"lat":2.0},{"hint":"bad","lon":500.0,"lat":2.0}]}"#,
        )
        .unwrap();
        let c = LocationCache::load(&path, 10);
        assert_eq!(c.len(), 1);
        assert!(c.get("bad").is_none());
    }
}
