// src/geocode/providers/nominatim.rs
use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_coord, trim_base, Candidate, GeocodeProvider};
use crate::errors::GeocodeProviderError;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// OpenStreetMap Nominatim search. The usage policy requires an identifying
/// User-Agent, which is set on the shared client.
pub struct NominatimProvider {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Place {
    // Nominatim encodes coordinates as strings.
    lat: String,
    lon: String,
}

impl NominatimProvider {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    async fn lookup(&self, query: &str) -> Result<Option<Candidate>, GeocodeProviderError> {
        let resp = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeProviderError::Status(status.as_u16()));
        }

        let places: Vec<Place> = resp
            .json()
            .await
            .map_err(|e| GeocodeProviderError::Decode(e.to_string()))?;

        match places.first() {
            None => Ok(None),
            Some(p) => Ok(Some(Candidate {
                lon: parse_coord(&p.lon, "lon")?,
                lat: parse_coord(&p.lat, "lat")?,
            })),
        }
    }

    fn name(&self) -> &str {
        "nominatim"
    }
}
