// src/geocode/providers/mod.rs
pub mod nominatim;
pub mod photon;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{GeocoderConfig, ProviderKind};
use crate::errors::GeocodeProviderError;
use crate::geocode::limiter::RateLimiter;

pub use nominatim::NominatimProvider;
pub use photon::PhotonProvider;

/// Raw coordinate as returned by a provider, not yet range-checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub lon: f64,
    pub lat: f64,
}

/// A free-text geocoding service. `Ok(None)` means the service answered
/// but found nothing.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Option<Candidate>, GeocodeProviderError>;
    fn name(&self) -> &str;
}

/// A provider together with the throttle guarding its call rate.
#[derive(Clone)]
pub struct ProviderSlot {
    pub provider: Arc<dyn GeocodeProvider>,
    pub limiter: Arc<RateLimiter>,
}

impl ProviderSlot {
    pub fn new(provider: Arc<dyn GeocodeProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { provider, limiter }
    }
}

/// Build the configured providers in priority order, sharing one HTTP pool.
pub fn build_providers(cfg: &GeocoderConfig, http: &reqwest::Client) -> Vec<ProviderSlot> {
    cfg.providers
        .iter()
        .map(|p| {
            let provider: Arc<dyn GeocodeProvider> = match p.kind {
                ProviderKind::Nominatim => {
                    Arc::new(NominatimProvider::new(http.clone(), &p.base_url))
                }
                ProviderKind::Photon => Arc::new(PhotonProvider::new(http.clone(), &p.base_url)),
            };
            ProviderSlot::new(provider, Arc::new(RateLimiter::from_millis(p.min_interval_ms)))
        })
        .collect()
}

pub(crate) fn trim_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

pub(crate) fn parse_coord(raw: &str, what: &str) -> Result<f64, GeocodeProviderError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| GeocodeProviderError::Decode(format!("{what} {raw:?}: {e}")))
}
