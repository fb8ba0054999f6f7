// tests/pipeline.rs
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use geoalert_harvester::config::HarvestConfig;
use geoalert_harvester::errors::{GeocodeProviderError, PersistenceError, SourceFetchError};
use geoalert_harvester::geocode::{
    Candidate, GeocodeProvider, LocationCache, LocationResolver, ProviderSlot, RateLimiter,
};
use geoalert_harvester::ingest::types::{SourceDescriptor, SourceFetcher};
use geoalert_harvester::model::{RecordId, SourceRecord};
use geoalert_harvester::pipeline::Harvest;
use geoalert_harvester::store::{staging_path, MergeStore};

struct OneFeed;

#[async_trait]
impl SourceFetcher for OneFeed {
    async fn fetch(&self, d: &SourceDescriptor) -> Result<Vec<SourceRecord>, SourceFetchError> {
        match d {
            SourceDescriptor::Feed { url } if url == "https://ok.example/feed" => Ok(vec![
                SourceRecord::new(RecordId::new("https://example.org/a").unwrap(), "Lodge")
                    .with_hints(["Madrid"]),
            ]),
            other => Err(SourceFetchError::Unsupported(other.to_string())),
        }
    }
}

struct Madrid;

#[async_trait]
impl GeocodeProvider for Madrid {
    async fn lookup(&self, query: &str) -> Result<Option<Candidate>, GeocodeProviderError> {
        Ok((query == "madrid").then_some(Candidate { lon: -3.7, lat: 40.4 }))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn harvest(cfg: HarvestConfig, cache: LocationCache) -> Harvest {
    let resolver = LocationResolver::new(
        Arc::new(cache),
        vec![ProviderSlot::new(Arc::new(Madrid), Arc::new(RateLimiter::unlimited()))],
        Duration::from_secs(5),
    );
    Harvest::with_parts(cfg, Arc::new(OneFeed), Arc::new(resolver))
}

fn config(dir: &std::path::Path) -> HarvestConfig {
    let mut cfg = HarvestConfig::from_toml_str(
        r#"
[sources]
feeds = ["https://ok.example/feed", "https://broken.example/feed"]
"#,
    )
    .unwrap();
    cfg.output_path = dir.join("data").join("alerts.geojson");
    cfg
}

#[tokio::test]
async fn run_writes_dataset_and_cache_despite_a_failed_source() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache").join("geocode.json");
    let cfg = config(dir.path());
    let out = cfg.output_path.clone();

    let summary = harvest(cfg, LocationCache::load(&cache_path, 100))
        .run()
        .await
        .expect("run ok");

    assert_eq!(summary.sources, 2);
    assert_eq!(summary.sources_ok, 1);
    assert_eq!(summary.failed_sources, vec!["feed:https://broken.example/feed".to_string()]);
    assert_eq!(summary.located, 1);
    assert_eq!(summary.dataset_size, 1);

    let stored = MergeStore::new(&out).load();
    assert!(stored.get(&RecordId::new("https://example.org/a").unwrap()).unwrap().point().is_some());

    let reloaded = LocationCache::load(&cache_path, 100);
    assert!(reloaded.get("madrid").is_some());
}

#[tokio::test]
async fn second_run_keeps_records_from_the_first() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let out = cfg.output_path.clone();

    // Seed a record that no source produces any more.
    fs::create_dir_all(out.parent().unwrap()).unwrap();
    fs::write(
        &out,
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"old","geometry":null,"properties":{"title":"Old"}}
        ]}"#,
    )
    .unwrap();

    let summary = harvest(cfg, LocationCache::in_memory(10)).run().await.unwrap();
    assert_eq!(summary.dataset_size, 2);
    assert!(MergeStore::new(&out).load().contains(&RecordId::new("old").unwrap()));
}

#[tokio::test]
async fn unwritable_output_fails_the_run() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let out = cfg.output_path.clone();
    fs::create_dir_all(staging_path(&out)).unwrap();

    let err = harvest(cfg, LocationCache::in_memory(10))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::WriteStaging { .. }), "got {err:?}");
    assert!(!out.exists());
}
