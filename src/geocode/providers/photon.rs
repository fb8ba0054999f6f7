// src/geocode/providers/photon.rs
use async_trait::async_trait;
use serde::Deserialize;

use super::{trim_base, Candidate, GeocodeProvider};
use crate::errors::GeocodeProviderError;

pub const DEFAULT_PHOTON_URL: &str = "https://photon.komoot.io";

/// Komoot Photon search; answers with a GeoJSON FeatureCollection.
pub struct PhotonProvider {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    // [lon, lat]
    coordinates: Vec<f64>,
}

impl PhotonProvider {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl GeocodeProvider for PhotonProvider {
    async fn lookup(&self, query: &str) -> Result<Option<Candidate>, GeocodeProviderError> {
        let resp = self
            .http
            .get(format!("{}/api/", self.base_url))
            .query(&[("q", query), ("limit", "1")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeProviderError::Status(status.as_u16()));
        }

        let body: Response = resp
            .json()
            .await
            .map_err(|e| GeocodeProviderError::Decode(e.to_string()))?;

        let Some(first) = body.features.first() else {
            return Ok(None);
        };
        match first.geometry.coordinates.as_slice() {
            [lon, lat, ..] => Ok(Some(Candidate {
                lon: *lon,
                lat: *lat,
            })),
            other => Err(GeocodeProviderError::Decode(format!(
                "expected [lon, lat], got {other:?}"
            ))),
        }
    }

    fn name(&self) -> &str {
        "photon"
    }
}
