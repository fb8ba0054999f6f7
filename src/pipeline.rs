// src/pipeline.rs
//! One harvest run: fetch → locate → merge → persist.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use metrics::gauge;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::config::HarvestConfig;
use crate::errors::PersistenceError;
use crate::geocode::providers::build_providers;
use crate::geocode::{LocationCache, LocationResolver};
use crate::ingest::priority::PriorityTerms;
use crate::ingest::providers::{HttpSourceFetcher, WikipediaSearch};
use crate::ingest::types::SourceFetcher;
use crate::ingest::worker::SourceWorker;
use crate::metrics::{describe_all, MetricsTextfile};
use crate::store::MergeStore;

/// Counters of a finished run, logged once at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: usize,
    pub sources_ok: usize,
    pub failed_sources: Vec<String>,
    pub records_fetched: usize,
    pub located: usize,
    pub collisions: usize,
    pub dataset_size: usize,
    pub cache_entries: usize,
    pub elapsed: Duration,
}

/// One HTTP pool for every source and provider of a run.
pub fn build_http_client(cfg: &HarvestConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.geocoder.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(cfg.workers)
        .build()
        .context("build HTTP client")
}

/// Run-scoped services. Nothing outlives the run.
pub struct Harvest {
    cfg: HarvestConfig,
    fetcher: Arc<dyn SourceFetcher>,
    resolver: Arc<LocationResolver>,
}

impl Harvest {
    /// Wire the HTTP-backed fetcher and providers from configuration.
    pub fn from_config(cfg: HarvestConfig) -> Result<Self> {
        let http = build_http_client(&cfg)?;

        let cache = match &cfg.geocoder.cache_path {
            Some(p) => LocationCache::load(p, cfg.geocoder.cache_capacity),
            None => LocationCache::in_memory(cfg.geocoder.cache_capacity),
        };
        let providers = build_providers(&cfg.geocoder, &http);
        let resolver = Arc::new(LocationResolver::new(
            Arc::new(cache),
            providers,
            cfg.provider_timeout(),
        ));

        let wikipedia = WikipediaSearch::new(http.clone(), &cfg.wikipedia, cfg.source_timeout());
        let fetcher = HttpSourceFetcher::new(http, wikipedia, cfg.source_timeout())
            .with_priority(PriorityTerms::new(&cfg.priority_terms));

        Ok(Self::with_parts(cfg, Arc::new(fetcher), resolver))
    }

    pub fn with_parts(
        cfg: HarvestConfig,
        fetcher: Arc<dyn SourceFetcher>,
        resolver: Arc<LocationResolver>,
    ) -> Self {
        Self {
            cfg,
            fetcher,
            resolver,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.cfg
    }

    /// Only a failure to write the dataset is returned; everything else is
    /// logged and reflected in the summary.
    pub async fn run(&self) -> Result<RunSummary, PersistenceError> {
        describe_all();
        let started = Instant::now();
        let descriptors = self.cfg.descriptors();
        let sources = descriptors.len();
        if sources == 0 {
            warn!("no sources configured; the dataset will only be rewritten");
        }

        let worker = SourceWorker::new(self.fetcher.clone(), self.resolver.clone());
        let aggregator = Aggregator::new(worker, self.cfg.workers, self.cfg.worker_budget());
        let report = aggregator.run(descriptors).await;

        let cache = self.resolver.cache();
        if let Err(e) = cache.save() {
            warn!(error = %e, "could not persist geocode cache");
        }

        let store = MergeStore::new(&self.cfg.output_path);
        let merged = store.merge_and_persist(&report.batch)?;

        gauge!("harvest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        let summary = RunSummary {
            sources,
            sources_ok: report.sources_ok,
            failed_sources: report.failed_sources,
            records_fetched: report.records_fetched,
            located: report.located,
            collisions: report.collisions,
            dataset_size: merged.len(),
            cache_entries: cache.len(),
            elapsed: started.elapsed(),
        };
        info!(
            sources = summary.sources,
            ok = summary.sources_ok,
            failed = summary.failed_sources.len(),
            records = summary.records_fetched,
            located = summary.located,
            dataset = summary.dataset_size,
            cache = summary.cache_entries,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "harvest finished"
        );
        Ok(summary)
    }
}

/// Build everything from `cfg` and run once.
pub async fn run(cfg: HarvestConfig) -> Result<RunSummary> {
    let harvest = Harvest::from_config(cfg)?;
    let summary = harvest.run().await?;
    Ok(summary)
}

/// Entry point of the binary: config from file + env, optional textfile
/// metrics, one run.
pub async fn run_from_env() -> Result<RunSummary> {
    let cfg = HarvestConfig::load_default().context("load harvest config")?;

    let textfile = match &cfg.metrics.textfile_path {
        Some(p) => match MetricsTextfile::install(p) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(error = %e, "metrics textfile disabled");
                None
            }
        },
        None => None,
    };

    let result = run(cfg).await;

    if let Some(t) = textfile {
        if let Err(e) = t.flush() {
            warn!(error = %e, path = %t.path().display(), "could not write metrics textfile");
        }
    }
    result
}
