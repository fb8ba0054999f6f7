// src/metrics.rs
//! Run metrics. Recorded through the `metrics` facade everywhere; exported
//! only when a Prometheus textfile path is configured.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::errors::PersistenceError;
use crate::store::write_atomically;

/// One-time metric descriptions (so series carry help text).
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_records_total", "Records parsed from sources.");
        describe_counter!(
            "ingest_source_errors_total",
            "Sources that failed, timed out or stopped paginating early."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!(
            "geocode_cache_hits_total",
            "Hints answered from the location cache."
        );
        describe_counter!(
            "geocode_provider_calls_total",
            "Geocoding provider calls, by provider."
        );
        describe_counter!(
            "geocode_provider_errors_total",
            "Failed or invalid geocoding provider calls, by provider."
        );
        describe_counter!(
            "geocode_unresolved_total",
            "Hints no provider could resolve."
        );
        describe_gauge!("dataset_features_total", "Features in the written dataset.");
        describe_gauge!("harvest_last_run_ts", "Unix ts when a harvest run last finished.");
    });
}

/// Prometheus recorder whose exposition is written to a file at the end of
/// a run (node-exporter textfile collector style).
pub struct MetricsTextfile {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl MetricsTextfile {
    /// Installs the global recorder; may be called once per process.
    pub fn install(path: impl Into<PathBuf>) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self {
            handle,
            path: path.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn flush(&self) -> Result<(), PersistenceError> {
        write_atomically(&self.path, self.render().as_bytes())
    }
}
