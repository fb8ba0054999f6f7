// src/ingest/worker.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::errors::SourceFetchError;
use crate::geocode::LocationResolver;
use crate::ingest::types::{SourceDescriptor, SourceFetcher};
use crate::model::{Located, Provenance, ResolvedRecord, SourceRecord};

/// Result of one source, success or not. `error` is set only when the
/// fetch failed, in which case `records` is empty.
#[derive(Debug)]
pub struct SourceOutcome {
    pub descriptor: SourceDescriptor,
    pub records: Vec<ResolvedRecord>,
    pub error: Option<SourceFetchError>,
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetches one source and locates each of its records.
#[derive(Clone)]
pub struct SourceWorker {
    fetcher: Arc<dyn SourceFetcher>,
    resolver: Arc<LocationResolver>,
}

impl SourceWorker {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, resolver: Arc<LocationResolver>) -> Self {
        Self { fetcher, resolver }
    }

    pub fn resolver(&self) -> &Arc<LocationResolver> {
        &self.resolver
    }

    /// Never fails: a source error is logged once and yields no records.
    #[instrument(level = "debug", skip(self), fields(source = %descriptor))]
    pub async fn run(&self, descriptor: &SourceDescriptor) -> SourceOutcome {
        let raw = match self.fetcher.fetch(descriptor).await {
            Ok(v) => v,
            Err(e) => return self.failed(descriptor, e),
        };

        let mut records = Vec::with_capacity(raw.len());
        for record in raw {
            records.push(self.resolve_record(record).await);
        }
        self.done(descriptor, records)
    }

    /// Like [`run`](Self::run), bounded by `budget`. A fetch that does not
    /// finish in time fails the source. Once the budget is spent during
    /// geocoding, the remaining records are kept without geometry.
    #[instrument(level = "debug", skip(self), fields(source = %descriptor))]
    pub async fn run_within(&self, descriptor: &SourceDescriptor, budget: Duration) -> SourceOutcome {
        let deadline = Instant::now() + budget;
        let raw = match timeout_at(deadline, self.fetcher.fetch(descriptor)).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return self.failed(descriptor, e),
            Err(_) => return self.failed(descriptor, SourceFetchError::Timeout(budget)),
        };

        let mut records = Vec::with_capacity(raw.len());
        let mut unattempted = 0usize;
        for record in raw {
            let located = match embedded_location(&record) {
                Some(l) => Some(l),
                None if Instant::now() >= deadline => {
                    unattempted += 1;
                    None
                }
                None => timeout_at(deadline, self.resolver.resolve_first(record.location_hints()))
                    .await
                    .unwrap_or_else(|_| {
                        unattempted += 1;
                        None
                    }),
            };
            records.push(ResolvedRecord::new(record, located));
        }
        if unattempted > 0 {
            warn!(
                source = %descriptor,
                unattempted,
                budget_secs = budget.as_secs(),
                "time budget spent while geocoding; remaining records kept unlocated"
            );
        }
        self.done(descriptor, records)
    }

    fn failed(&self, descriptor: &SourceDescriptor, e: SourceFetchError) -> SourceOutcome {
        warn!(source = %descriptor, error = %e, "source failed");
        counter!("ingest_source_errors_total").increment(1);
        SourceOutcome {
            descriptor: descriptor.clone(),
            records: Vec::new(),
            error: Some(e),
        }
    }

    fn done(&self, descriptor: &SourceDescriptor, records: Vec<ResolvedRecord>) -> SourceOutcome {
        debug!(
            source = %descriptor,
            records = records.len(),
            located = records.iter().filter(|r| r.point().is_some()).count(),
            "source done"
        );
        SourceOutcome {
            descriptor: descriptor.clone(),
            records,
            error: None,
        }
    }

    /// Records of one source; empty if the source failed.
    pub async fn fetch(&self, descriptor: &SourceDescriptor) -> Vec<ResolvedRecord> {
        self.run(descriptor).await.records
    }

    /// Embedded coordinates win; otherwise the first hint that resolves.
    /// A record nothing resolves for is kept without geometry.
    pub async fn resolve_record(&self, record: SourceRecord) -> ResolvedRecord {
        let located = match embedded_location(&record) {
            Some(l) => Some(l),
            None => self.resolver.resolve_first(record.location_hints()).await,
        };
        ResolvedRecord::new(record, located)
    }
}

fn embedded_location(record: &SourceRecord) -> Option<Located> {
    record.embedded_point().map(|point| Located {
        point,
        provenance: Provenance::Feed,
    })
}
