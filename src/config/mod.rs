// src/config/mod.rs
pub mod harvest;

pub use harvest::{
    GeocoderConfig, HarvestConfig, MetricsConfig, PriorityTerm, ProviderConfig, ProviderKind,
    SourcesConfig, WikipediaConfig,
};
