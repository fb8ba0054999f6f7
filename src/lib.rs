// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod config;
pub mod errors;
pub mod geocode;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod store;

pub use crate::aggregator::{Aggregator, BatchReport};
pub use crate::geocode::{LocationResolver, Resolution};
pub use crate::model::{Dataset, GeoPoint, RecordId, ResolvedRecord, SourceRecord};
pub use crate::store::MergeStore;
