// src/config/harvest.rs
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use tracing::warn;

use crate::errors::ConfigError;
use crate::ingest::types::SourceDescriptor;

pub const DEFAULT_CONFIG_PATH: &str = "config/harvest.toml";
pub const ENV_CONFIG_PATH: &str = "HARVEST_CONFIG_PATH";
pub const ENV_OUTPUT_PATH: &str = "HARVEST_OUTPUT_PATH";
pub const ENV_WORKERS: &str = "HARVEST_WORKERS";
pub const ENV_CACHE_PATH: &str = "HARVEST_CACHE_PATH";
pub const ENV_USER_AGENT: &str = "HARVEST_USER_AGENT";

const MAX_WORKERS: usize = 64;

fn default_output_path() -> PathBuf {
    PathBuf::from("data/alerts.geojson")
}
fn default_workers() -> usize {
    8
}
fn default_source_timeout_secs() -> u64 {
    30
}
fn default_worker_budget_secs() -> u64 {
    1_800
}
fn default_user_agent() -> String {
    concat!("geoalert-harvester/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_provider_timeout_secs() -> u64 {
    10
}
fn default_min_interval_ms() -> u64 {
    1_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub output_path: PathBuf,
    pub workers: usize,
    pub source_timeout_secs: u64,
    /// Upper bound for one source including all of its geocoding.
    pub worker_budget_secs: u64,
    pub geocoder: GeocoderConfig,
    pub wikipedia: WikipediaConfig,
    pub sources: SourcesConfig,
    pub priority_terms: Vec<PriorityTerm>,
    pub metrics: MetricsConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            workers: default_workers(),
            source_timeout_secs: default_source_timeout_secs(),
            worker_budget_secs: default_worker_budget_secs(),
            geocoder: GeocoderConfig::default(),
            wikipedia: WikipediaConfig::default(),
            sources: SourcesConfig::default(),
            priority_terms: Vec::new(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub user_agent: String,
    pub cache_path: Option<PathBuf>,
    pub cache_capacity: usize,
    pub provider_timeout_secs: u64,
    /// Tried in order; the first valid answer wins.
    pub providers: Vec<ProviderConfig>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            cache_path: Some(PathBuf::from("cache/geocode.json")),
            cache_capacity: crate::geocode::cache::DEFAULT_CACHE_CAPACITY,
            provider_timeout_secs: default_provider_timeout_secs(),
            providers: vec![
                ProviderConfig {
                    kind: ProviderKind::Nominatim,
                    base_url: crate::geocode::providers::nominatim::DEFAULT_NOMINATIM_URL
                        .to_string(),
                    min_interval_ms: default_min_interval_ms(),
                },
                ProviderConfig {
                    kind: ProviderKind::Photon,
                    base_url: crate::geocode::providers::photon::DEFAULT_PHOTON_URL.to_string(),
                    min_interval_ms: default_min_interval_ms(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Nominatim,
    Photon,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    /// `{lang}` is replaced by the language code of the descriptor.
    pub api_url: String,
    pub min_interval_ms: u64,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_url: "https://{lang}.wikipedia.org/w/api.php".to_string(),
            // ~50 requests per minute
            min_interval_ms: 1_200,
            page_size: 50,
            max_pages: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub feeds: Vec<String>,
    pub search_terms: Vec<String>,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PriorityTerm {
    pub term: String,
    pub weight: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub textfile_path: Option<PathBuf>,
}

impl HarvestConfig {
    /// Parse and sanitize a TOML document. Env overrides are not applied.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let mut cfg: HarvestConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the config file and apply env overrides:
    /// 1) $HARVEST_CONFIG_PATH (must exist when set)
    /// 2) config/harvest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingEnvPath(pb));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                warn!(
                    path = DEFAULT_CONFIG_PATH,
                    "no harvest config found; using built-in defaults"
                );
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = non_empty_env(ENV_OUTPUT_PATH) {
            self.output_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env(ENV_WORKERS) {
            match v.parse::<usize>() {
                Ok(n) => self.workers = n,
                Err(_) => warn!(value = %v, "ignoring non-numeric {ENV_WORKERS}"),
            }
        }
        if let Some(v) = non_empty_env(ENV_CACHE_PATH) {
            self.geocoder.cache_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty_env(ENV_USER_AGENT) {
            self.geocoder.user_agent = v;
        }
        self.sanitize();
    }

    /// Clamp numbers into usable ranges and clean up source lists.
    pub fn sanitize(&mut self) {
        self.workers = self.workers.clamp(1, MAX_WORKERS);
        if self.source_timeout_secs == 0 {
            self.source_timeout_secs = default_source_timeout_secs();
        }
        if self.worker_budget_secs == 0 {
            self.worker_budget_secs = default_worker_budget_secs();
        }
        if self.geocoder.provider_timeout_secs == 0 {
            self.geocoder.provider_timeout_secs = default_provider_timeout_secs();
        }
        if self.geocoder.user_agent.trim().is_empty() {
            self.geocoder.user_agent = default_user_agent();
        }
        self.geocoder.cache_capacity = self.geocoder.cache_capacity.max(1);
        self.wikipedia.page_size = self.wikipedia.page_size.clamp(1, 500);
        self.wikipedia.max_pages = self.wikipedia.max_pages.max(1);

        self.sources.feeds = clean_list(std::mem::take(&mut self.sources.feeds));
        self.sources.search_terms = clean_list(std::mem::take(&mut self.sources.search_terms));
        self.sources.languages = clean_list(
            std::mem::take(&mut self.sources.languages)
                .into_iter()
                .map(|l| l.to_ascii_lowercase())
                .collect(),
        );
        self.priority_terms.retain(|t| !t.term.trim().is_empty());
    }

    /// Every feed, then every (search term × language) pair.
    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        let mut out: Vec<SourceDescriptor> = self
            .sources
            .feeds
            .iter()
            .map(|u| SourceDescriptor::feed(u.as_str()))
            .collect();
        for term in &self.sources.search_terms {
            for lang in &self.sources.languages {
                out.push(SourceDescriptor::search(term.as_str(), lang.as_str()));
            }
        }
        out
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn worker_budget(&self) -> Duration {
        Duration::from_secs(self.worker_budget_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder.provider_timeout_secs)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim, drop empties, drop duplicates; first occurrence keeps its place.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}
