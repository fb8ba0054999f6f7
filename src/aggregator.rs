// src/aggregator.rs
//! Fan-out of source descriptors over a bounded pool of workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::ingest::types::SourceDescriptor;
use crate::ingest::worker::{SourceOutcome, SourceWorker};
use crate::model::Dataset;

pub const DEFAULT_WORKERS: usize = 8;

/// What one batch produced. Failures are listed, never raised.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub batch: Dataset,
    pub sources_ok: usize,
    pub failed_sources: Vec<String>,
    pub records_fetched: usize,
    pub located: usize,
    /// Records that replaced an earlier record of the same batch.
    pub collisions: usize,
}

impl BatchReport {
    pub fn sources_failed(&self) -> usize {
        self.failed_sources.len()
    }
}

pub struct Aggregator {
    worker: SourceWorker,
    workers: usize,
    worker_budget: Duration,
}

impl Aggregator {
    pub fn new(worker: SourceWorker, workers: usize, worker_budget: Duration) -> Self {
        Self {
            worker,
            workers: workers.max(1),
            worker_budget,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every descriptor and wait for all of them. At most `workers`
    /// sources are in flight. A fetch over its budget fails the source;
    /// geocoding over budget leaves the rest of its records unlocated.
    /// Intra-batch duplicates: the last completed task wins.
    pub async fn run(&self, descriptors: Vec<SourceDescriptor>) -> BatchReport {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut set: JoinSet<SourceOutcome> = JoinSet::new();

        info!(
            sources = descriptors.len(),
            workers = self.workers,
            "batch started"
        );

        for descriptor in descriptors {
            let permits = permits.clone();
            let worker = self.worker.clone();
            let budget = self.worker_budget;
            set.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                worker.run_within(&descriptor, budget).await
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) if outcome.is_ok() => {
                    report.sources_ok += 1;
                    report.records_fetched += outcome.records.len();
                    for record in outcome.records {
                        let id = record.id().clone();
                        if report.batch.insert(record).is_some() {
                            report.collisions += 1;
                            debug!(id = %id, source = %outcome.descriptor, "duplicate id within batch, keeping latest");
                        }
                    }
                }
                Ok(outcome) => report.failed_sources.push(outcome.descriptor.to_string()),
                Err(e) => {
                    error!(error = %e, "source task aborted");
                    report.failed_sources.push(format!("task:{e}"));
                }
            }
        }
        report.located = report.batch.located_count();
        report.failed_sources.sort();

        info!(
            ok = report.sources_ok,
            failed = report.sources_failed(),
            records = report.batch.len(),
            located = report.located,
            "batch finished"
        );
        report
    }
}
