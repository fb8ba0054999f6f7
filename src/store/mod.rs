// src/store/mod.rs
//! Durable dataset: last-write-wins merge and atomic replacement of the
//! GeoJSON file.

pub mod geojson;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use metrics::gauge;
use tracing::{debug, info, warn};

use crate::errors::{CorruptPriorState, PersistenceError};
use crate::model::Dataset;

/// Start from `previous`; every record of `batch` replaces the stored one
/// with the same id. Nothing is ever removed.
pub fn merge(previous: &Dataset, batch: &Dataset) -> Dataset {
    let mut merged = previous.clone();
    for record in batch.iter() {
        merged.insert(record.clone());
    }
    merged
}

/// Sibling of `target` used while writing; same directory so the final
/// rename never crosses filesystems.
pub fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    target.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Write `bytes` to a staging file, fsync it, then rename over `path`.
/// On any error the staging file is removed and `path` is left as it was.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| PersistenceError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let tmp = staging_path(path);
    let staged = (|| -> io::Result<()> {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()
    })();
    if let Err(source) = staged {
        let _ = fs::remove_file(&tmp);
        return Err(PersistenceError::WriteStaging { path: tmp, source });
    }

    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PersistenceError::Replace {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// The dataset file of one deployment. Runs are assumed not to overlap.
#[derive(Debug, Clone)]
pub struct MergeStore {
    path: PathBuf,
}

impl MergeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no file exists yet.
    pub fn try_load(&self) -> Result<Option<Dataset>, CorruptPriorState> {
        let data = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CorruptPriorState::Unreadable {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let doc: serde_json::Value =
            serde_json::from_str(&data).map_err(|source| CorruptPriorState::InvalidJson {
                path: self.path.clone(),
                source,
            })?;
        match geojson::decode(&doc) {
            Some(ds) => Ok(Some(ds)),
            None => Err(CorruptPriorState::NotFeatureCollection {
                path: self.path.clone(),
                found: doc.get("type").and_then(|t| t.as_str()).map(str::to_string),
            }),
        }
    }

    /// Prior dataset; a missing or unusable file counts as empty.
    pub fn load(&self) -> Dataset {
        match self.try_load() {
            Ok(Some(ds)) => {
                debug!(path = %self.path.display(), records = ds.len(), "prior dataset loaded");
                ds
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no prior dataset, starting empty");
                Dataset::new()
            }
            Err(e) => {
                warn!(error = %e, "prior dataset unusable, starting empty");
                Dataset::new()
            }
        }
    }

    pub fn persist(&self, dataset: &Dataset) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(&geojson::encode(dataset))?;
        write_atomically(&self.path, &bytes)?;
        gauge!("dataset_features_total").set(dataset.len() as f64);
        info!(path = %self.path.display(), features = dataset.len(), "dataset written");
        Ok(())
    }

    /// Load, merge `batch` over it, write. Returns the merged dataset.
    pub fn merge_and_persist(&self, batch: &Dataset) -> Result<Dataset, PersistenceError> {
        let previous = self.load();
        let merged = merge(&previous, batch);
        debug!(
            previous = previous.len(),
            batch = batch.len(),
            merged = merged.len(),
            "merged batch into dataset"
        );
        self.persist(&merged)?;
        Ok(merged)
    }
}
