// tests/providers_wikipedia.rs
use std::time::Duration;

use httptest::matchers::{all_of, contains, request, url_decoded};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use serde_json::Value;

use geoalert_harvester::config::WikipediaConfig;
use geoalert_harvester::errors::SourceFetchError;
use geoalert_harvester::ingest::hints::PatternHintExtractor;
use geoalert_harvester::ingest::providers::WikipediaSearch;
use geoalert_harvester::model::RecordId;

const PAGE1: &str = include_str!("fixtures/wiki_search_page1.json");
const PAGE2: &str = include_str!("fixtures/wiki_search_page2.json");

fn page(raw: &str) -> Value {
    serde_json::from_str(raw).expect("fixture json")
}

fn search_for(server: &Server, max_pages: u32) -> WikipediaSearch {
    let cfg = WikipediaConfig {
        api_url: server.url("/w/api.php").to_string(),
        min_interval_ms: 0,
        page_size: 2,
        max_pages,
    };
    WikipediaSearch::new(reqwest::Client::new(), &cfg, Duration::from_secs(5))
}

fn expect_page(server: &Server, offset: &'static str, body: Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/w/api.php"),
            request::query(url_decoded(contains(("sroffset", offset)))),
        ])
        .respond_with(json_encoded(body)),
    );
}

#[tokio::test]
async fn follows_continuation_until_exhausted() {
    let server = Server::run();
    expect_page(&server, "0", page(PAGE1));
    expect_page(&server, "2", page(PAGE2));

    let records = search_for(&server, 10)
        .search("grand lodge", "en", &PatternHintExtractor)
        .await
        .expect("search ok");

    let ids: Vec<RecordId> = records.iter().map(|r| r.id().clone()).collect();
    assert_eq!(
        ids,
        vec![
            RecordId::wikipedia("en", 1001),
            RecordId::wikipedia("en", 1002),
            RecordId::wikipedia("en", 1003),
        ]
    );

    let first = &records[0];
    assert_eq!(first.title(), "Grand Lodge of Scotland");
    assert_eq!(first.body_text(), "The Grand Lodge meets in Edinburgh");
    assert_eq!(first.location_hints(), ["Edinburgh"]);
    assert_eq!(first.language(), Some("en"));
    assert_eq!(first.attributes()["keyword"], "grand lodge");
    assert_eq!(first.attributes()["pageid"], 1001);
    assert_eq!(records[1].location_hints(), ["Detroit"]);
}

#[tokio::test]
async fn search_term_is_sent_as_exact_phrase() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::path("/w/api.php"),
            request::query(url_decoded(contains(("srsearch", "\"masonic temple\"")))),
            request::query(url_decoded(contains(("list", "search")))),
            request::query(url_decoded(contains(("srlimit", "2")))),
        ])
        .respond_with(json_encoded(page(PAGE2))),
    );

    let records = search_for(&server, 10)
        .search("masonic temple", "en", &PatternHintExtractor)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn later_page_failure_keeps_partial_results() {
    let server = Server::run();
    expect_page(&server, "0", page(PAGE1));
    server.expect(
        Expectation::matching(request::query(url_decoded(contains(("sroffset", "2")))))
            .respond_with(status_code(500)),
    );

    let records = search_for(&server, 10)
        .search("grand lodge", "en", &PatternHintExtractor)
        .await
        .expect("partial results");
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn first_page_failure_is_an_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/w/api.php")).respond_with(status_code(503)),
    );

    let err = search_for(&server, 10)
        .search("grand lodge", "en", &PatternHintExtractor)
        .await
        .unwrap_err();
    assert!(
        matches!(err, SourceFetchError::Status { status: 503, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn page_cap_stops_pagination() {
    let server = Server::run();
    expect_page(&server, "0", page(PAGE1));

    let records = search_for(&server, 1)
        .search("grand lodge", "en", &PatternHintExtractor)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn bad_language_code_makes_no_request() {
    let server = Server::run();
    let err = search_for(&server, 10)
        .search("grand lodge", "en.attacker.example/", &PatternHintExtractor)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceFetchError::Unsupported(_)), "got {err:?}");
}
