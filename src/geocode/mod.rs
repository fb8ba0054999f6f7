// src/geocode/mod.rs
//! Location resolution: free-text hint → validated coordinate.
//!
//! Lookup order is cache, then each configured provider once, in order.
//! "No location" is a normal outcome and never an error for the caller.

pub mod cache;
pub mod limiter;
pub mod normalize;
pub mod providers;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::errors::GeocodeProviderError;
use crate::model::{GeoPoint, Located, Provenance};

pub use cache::LocationCache;
pub use limiter::RateLimiter;
pub use normalize::normalize_hint;
pub use providers::{Candidate, GeocodeProvider, ProviderSlot};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of resolving one hint.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Located),
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Nothing left after normalization; no provider was called.
    EmptyHint,
    /// At least one provider answered without a usable match.
    NoMatch,
    /// Every provider errored, timed out or returned invalid data.
    Exhausted,
}

impl Resolution {
    pub fn located(self) -> Option<Located> {
        match self {
            Resolution::Resolved(l) => Some(l),
            Resolution::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Shared by every worker of a run; constructed once and passed by `Arc`.
pub struct LocationResolver {
    cache: Arc<LocationCache>,
    providers: Vec<ProviderSlot>,
    call_timeout: Duration,
}

impl LocationResolver {
    pub fn new(cache: Arc<LocationCache>, providers: Vec<ProviderSlot>, call_timeout: Duration) -> Self {
        Self {
            cache,
            providers,
            call_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<LocationCache> {
        &self.cache
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|s| s.provider.name().to_string())
            .collect()
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, hint: &str) -> Resolution {
        let key = normalize_hint(hint);
        if key.is_empty() {
            return Resolution::Unresolved(UnresolvedReason::EmptyHint);
        }

        if let Some(point) = self.cache.get(&key) {
            counter!("geocode_cache_hits_total").increment(1);
            return Resolution::Resolved(Located {
                point,
                provenance: Provenance::Cache,
            });
        }

        let mut failures = 0usize;
        for slot in &self.providers {
            let name = slot.provider.name().to_string();
            match self.call(slot, &key).await {
                Ok(Some(point)) => {
                    self.cache.insert(key.clone(), point);
                    debug!(hint = %key, provider = %name, lon = point.lon(), lat = point.lat(), "hint resolved");
                    return Resolution::Resolved(Located {
                        point,
                        provenance: Provenance::Provider(name),
                    });
                }
                Ok(None) => {
                    debug!(hint = %key, provider = %name, "provider found no match");
                }
                Err(e) => {
                    failures += 1;
                    counter!("geocode_provider_errors_total", "provider" => name.clone())
                        .increment(1);
                    warn!(hint = %key, provider = %name, error = %e, "geocode provider failed");
                }
            }
        }

        counter!("geocode_unresolved_total").increment(1);
        let reason = if !self.providers.is_empty() && failures == self.providers.len() {
            UnresolvedReason::Exhausted
        } else {
            UnresolvedReason::NoMatch
        };
        debug!(hint = %key, ?reason, "hint left unresolved");
        Resolution::Unresolved(reason)
    }

    /// Try hints in order and stop at the first one that resolves.
    pub async fn resolve_first<S: AsRef<str>>(&self, hints: &[S]) -> Option<Located> {
        for hint in hints {
            if let Resolution::Resolved(located) = self.resolve(hint.as_ref()).await {
                return Some(located);
            }
        }
        None
    }

    /// One throttled, time-bounded provider call with range validation.
    async fn call(
        &self,
        slot: &ProviderSlot,
        query: &str,
    ) -> Result<Option<GeoPoint>, GeocodeProviderError> {
        slot.limiter.acquire().await;
        counter!("geocode_provider_calls_total", "provider" => slot.provider.name().to_string())
            .increment(1);

        let candidate = tokio::time::timeout(self.call_timeout, slot.provider.lookup(query))
            .await
            .map_err(|_| GeocodeProviderError::Timeout(self.call_timeout))??;

        match candidate {
            None => Ok(None),
            Some(c) => Ok(Some(GeoPoint::new(c.lon, c.lat)?)),
        }
    }
}
