// src/errors.rs
//! Error taxonomy for a harvest run.
//!
//! Only [`PersistenceError`] is allowed to fail a run. Everything else is
//! caught at the worker or resolver boundary and logged.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A coordinate pair that cannot become a `GeoPoint`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("coordinate is not a finite number (lon={lon}, lat={lat})")]
    NotFinite { lon: f64, lat: f64 },
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
}

/// One source could not be fetched or parsed.
#[derive(Debug, Error)]
pub enum SourceFetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("cannot parse {what}: {message}")]
    Parse { what: String, message: String },
    #[error("source did not finish within {0:?}")]
    Timeout(Duration),
    #[error("unsupported source descriptor: {0}")]
    Unsupported(String),
}

impl SourceFetchError {
    pub(crate) fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn parse(what: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

/// One geocoding provider call failed or produced unusable data.
#[derive(Debug, Error)]
pub enum GeocodeProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered with HTTP {0}")]
    Status(u16),
    #[error("cannot decode provider response: {0}")]
    Decode(String),
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider returned an invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordinateError),
}

/// The merged dataset (or another durable artifact) could not be written.
/// The previous file at the target path is left untouched.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write staging file {path}: {source}")]
    WriteStaging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The previously persisted dataset exists but cannot be used.
/// Recovered by starting from an empty dataset.
#[derive(Debug, Error)]
pub enum CorruptPriorState {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} is not a FeatureCollection (type = {found:?})")]
    NotFeatureCollection { path: PathBuf, found: Option<String> },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("HARVEST_CONFIG_PATH points to non-existent path {0}")]
    MissingEnvPath(PathBuf),
}
