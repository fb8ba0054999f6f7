// tests/geocode_http.rs
use std::sync::Arc;
use std::time::Duration;

use httptest::matchers::{all_of, contains, request, url_decoded};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use serde_json::json;

use geoalert_harvester::errors::GeocodeProviderError;
use geoalert_harvester::geocode::providers::{NominatimProvider, PhotonProvider};
use geoalert_harvester::geocode::{
    Candidate, GeocodeProvider, LocationCache, LocationResolver, ProviderSlot, RateLimiter,
};
use geoalert_harvester::model::Provenance;

fn base(server: &Server) -> String {
    server.url("/").to_string()
}

#[tokio::test]
async fn nominatim_parses_string_coordinates() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/search"),
            request::query(url_decoded(contains(("q", "madrid")))),
            request::query(url_decoded(contains(("format", "jsonv2")))),
        ])
        .respond_with(json_encoded(json!([
            { "lat": "40.4168", "lon": "-3.7038", "display_name": "Madrid, España" }
        ]))),
    );

    let p = NominatimProvider::new(reqwest::Client::new(), &base(&server));
    let c = p.lookup("madrid").await.expect("lookup ok");
    assert_eq!(
        c,
        Some(Candidate {
            lon: -3.7038,
            lat: 40.4168
        })
    );
}

#[tokio::test]
async fn nominatim_empty_answer_is_no_match() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/search")).respond_with(json_encoded(json!([]))),
    );
    let p = NominatimProvider::new(reqwest::Client::new(), &base(&server));
    assert_eq!(p.lookup("nowhere at all").await.unwrap(), None);
}

#[tokio::test]
async fn nominatim_http_error_is_reported() {
    let server = Server::run();
    server.expect(Expectation::matching(request::path("/search")).respond_with(status_code(429)));
    let p = NominatimProvider::new(reqwest::Client::new(), &base(&server));
    let err = p.lookup("madrid").await.unwrap_err();
    assert!(matches!(err, GeocodeProviderError::Status(429)), "got {err:?}");
}

#[tokio::test]
async fn photon_reads_lon_lat_order() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/"),
            request::query(url_decoded(contains(("q", "lyon")))),
        ])
        .respond_with(json_encoded(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [4.8320, 45.7578] },
                "properties": { "name": "Lyon" }
            }]
        }))),
    );

    let p = PhotonProvider::new(reqwest::Client::new(), &base(&server));
    let c = p.lookup("lyon").await.unwrap().expect("match");
    assert_eq!((c.lon, c.lat), (4.8320, 45.7578));
}

#[tokio::test]
async fn resolver_falls_back_to_photon_over_http() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/search")).respond_with(status_code(503)),
    );
    server.expect(
        Expectation::matching(request::path("/api/")).respond_with(json_encoded(json!({
            "features": [{ "geometry": { "coordinates": [-3.7, 40.4] } }]
        }))),
    );

    let http = reqwest::Client::new();
    let slots = vec![
        ProviderSlot::new(
            Arc::new(NominatimProvider::new(http.clone(), &base(&server))),
            Arc::new(RateLimiter::unlimited()),
        ),
        ProviderSlot::new(
            Arc::new(PhotonProvider::new(http, &base(&server))),
            Arc::new(RateLimiter::unlimited()),
        ),
    ];
    let resolver = LocationResolver::new(
        Arc::new(LocationCache::in_memory(16)),
        slots,
        Duration::from_secs(5),
    );

    let located = resolver.resolve("Madrid").await.located().expect("resolved");
    assert_eq!((located.point.lon(), located.point.lat()), (-3.7, 40.4));
    assert_eq!(located.provenance, Provenance::Provider("photon".into()));

    // Cached: no further HTTP traffic (each expectation allows one hit).
    let again = resolver.resolve("  MADRID ").await.located().unwrap();
    assert_eq!(again.provenance, Provenance::Cache);
    assert_eq!(again.point, located.point);
}
