// tests/config.rs
use std::path::PathBuf;
use std::{env, fs};

use geoalert_harvester::config::harvest::{
    ENV_CACHE_PATH, ENV_CONFIG_PATH, ENV_OUTPUT_PATH, ENV_USER_AGENT, ENV_WORKERS,
};
use geoalert_harvester::config::HarvestConfig;
use geoalert_harvester::errors::ConfigError;
use geoalert_harvester::ingest::types::SourceDescriptor;

const ALL_ENV: [&str; 5] = [
    ENV_CONFIG_PATH,
    ENV_OUTPUT_PATH,
    ENV_WORKERS,
    ENV_CACHE_PATH,
    ENV_USER_AGENT,
];

fn clear_env() {
    for k in ALL_ENV {
        env::remove_var(k);
    }
}

#[test]
fn shipped_sample_config_parses() {
    let sample = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/harvest.toml");
    let cfg = HarvestConfig::load_from(&sample).expect("sample ok");
    assert_eq!(cfg.workers, 8);
    assert!(!cfg.sources.feeds.is_empty());
    assert_eq!(cfg.priority_terms.len(), 3);
    assert_eq!(
        cfg.descriptors().len(),
        cfg.sources.feeds.len() + cfg.sources.search_terms.len() * cfg.sources.languages.len()
    );
}

#[test]
fn descriptors_list_feeds_then_term_language_pairs() {
    let cfg = HarvestConfig::from_toml_str(
        r#"
[sources]
feeds = ["https://a.example/feed"]
search_terms = ["lodge"]
languages = ["en", "fr"]
"#,
    )
    .unwrap();
    assert_eq!(
        cfg.descriptors(),
        vec![
            SourceDescriptor::feed("https://a.example/feed"),
            SourceDescriptor::search("lodge", "en"),
            SourceDescriptor::search("lodge", "fr"),
        ]
    );
}

#[test]
fn unparsable_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("harvest.toml");
    fs::write(&p, "workers = \"many\"").unwrap();
    let err = HarvestConfig::load_from(&p).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) Nothing at all → built-in defaults
    let cfg = HarvestConfig::load_default().unwrap();
    assert_eq!(cfg.workers, 8);
    assert_eq!(cfg.output_path, PathBuf::from("data/alerts.geojson"));

    // 2) ./config/harvest.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/harvest.toml"), "workers = 3").unwrap();
    assert_eq!(HarvestConfig::load_default().unwrap().workers, 3);

    // 3) HARVEST_CONFIG_PATH wins
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, "workers = 5").unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(HarvestConfig::load_default().unwrap().workers, 5);

    // 4) ...but must exist
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    let err = HarvestConfig::load_default().unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvPath(_)), "got {err:?}");

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_after_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("harvest.toml");
    fs::write(
        &p,
        r#"
output_path = "from-file.geojson"
workers = 4
"#,
    )
    .unwrap();

    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    env::set_var(ENV_OUTPUT_PATH, "/tmp/override.geojson");
    env::set_var(ENV_WORKERS, "1000");
    env::set_var(ENV_CACHE_PATH, "/tmp/geo-cache.json");
    env::set_var(ENV_USER_AGENT, "tests/1.0");

    let cfg = HarvestConfig::load_default().unwrap();
    assert_eq!(cfg.output_path, PathBuf::from("/tmp/override.geojson"));
    // clamped
    assert_eq!(cfg.workers, 64);
    assert_eq!(
        cfg.geocoder.cache_path,
        Some(PathBuf::from("/tmp/geo-cache.json"))
    );
    assert_eq!(cfg.geocoder.user_agent, "tests/1.0");

    env::set_var(ENV_WORKERS, "lots");
    assert_eq!(HarvestConfig::load_default().unwrap().workers, 4);

    clear_env();
}
