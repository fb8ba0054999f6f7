// src/ingest/providers/wikipedia.rs
//! Wikipedia full-text search (`list=search`) for one term in one language.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::WikipediaConfig;
use crate::errors::SourceFetchError;
use crate::geocode::RateLimiter;
use crate::ingest::hints::{push_unique, HintExtractor};
use crate::ingest::{normalize_body, normalize_text};
use crate::model::{Published, RecordId, SourceRecord};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<Query>,
    #[serde(rename = "continue", default)]
    cont: Option<Continue>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    pageid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Continue {
    sroffset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

/// Search client shared by every search descriptor of a run. All calls go
/// through one throttle regardless of language.
pub struct WikipediaSearch {
    http: reqwest::Client,
    api_url: String,
    page_size: u32,
    max_pages: u32,
    page_timeout: Duration,
    limiter: Arc<RateLimiter>,
}

impl WikipediaSearch {
    /// `page_timeout` bounds each request; time spent waiting on the
    /// throttle is not counted.
    pub fn new(http: reqwest::Client, cfg: &WikipediaConfig, page_timeout: Duration) -> Self {
        Self {
            http,
            api_url: cfg.api_url.clone(),
            page_size: cfg.page_size.max(1),
            max_pages: cfg.max_pages.max(1),
            page_timeout,
            limiter: Arc::new(RateLimiter::from_millis(cfg.min_interval_ms)),
        }
    }

    /// `{lang}` in the configured URL is replaced by the language code.
    pub fn endpoint(&self, language: &str) -> String {
        self.api_url.replace("{lang}", language)
    }

    /// Every page of results for `term` in `language`, up to `max_pages`.
    /// A failure on the first page is an error; a later one keeps what was
    /// already collected.
    pub async fn search(
        &self,
        term: &str,
        language: &str,
        extractor: &dyn HintExtractor,
    ) -> Result<Vec<SourceRecord>, SourceFetchError> {
        if !is_valid_language(language) {
            return Err(SourceFetchError::Unsupported(format!(
                "wikipedia language code {language:?}"
            )));
        }
        let url = self.endpoint(language);
        let quoted = format!("\"{term}\"");
        let limit = self.page_size.to_string();

        let mut out = Vec::new();
        let mut offset: u64 = 0;
        for page in 0..self.max_pages {
            self.limiter.acquire().await;
            let result = tokio::time::timeout(
                self.page_timeout,
                self.fetch_page(&url, &quoted, &limit, offset),
            )
            .await
            .unwrap_or(Err(SourceFetchError::Timeout(self.page_timeout)));
            let body = match result {
                Ok(b) => b,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(error = %e, term, language, page, "wikipedia pagination stopped early");
                    counter!("ingest_source_errors_total").increment(1);
                    break;
                }
            };

            let hits = body.query.map(|q| q.search).unwrap_or_default();
            if hits.is_empty() {
                break;
            }
            out.extend(
                hits.into_iter()
                    .map(|h| hit_to_record(h, term, language, extractor)),
            );

            match body.cont.and_then(|c| c.sroffset) {
                Some(next) if next > offset => offset = next,
                _ => break,
            }
        }
        debug!(term, language, records = out.len(), "wikipedia search done");
        Ok(out)
    }

    async fn fetch_page(
        &self,
        url: &str,
        srsearch: &str,
        srlimit: &str,
        offset: u64,
    ) -> Result<SearchResponse, SourceFetchError> {
        let offset = offset.to_string();
        let resp = self
            .http
            .get(url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", srsearch),
                ("srlimit", srlimit),
                ("sroffset", offset.as_str()),
                ("srprop", "snippet|timestamp"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| SourceFetchError::http(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SourceFetchError::parse("wikipedia search response", e))?;
        if let Some(err) = &body.error {
            return Err(SourceFetchError::parse(
                "wikipedia search response",
                format!("api error {}: {}", err.code, err.info),
            ));
        }
        Ok(body)
    }
}

fn hit_to_record(
    hit: SearchHit,
    term: &str,
    language: &str,
    extractor: &dyn HintExtractor,
) -> SourceRecord {
    let title = normalize_text(&hit.title);
    let body = normalize_body(&hit.snippet);

    let mut hints = Vec::new();
    for h in extractor.extract(&title) {
        push_unique(&mut hints, &h);
    }
    for h in extractor.extract(&body) {
        push_unique(&mut hints, &h);
    }

    let link = format!(
        "https://{language}.wikipedia.org/wiki/{}",
        title.replace(' ', "_")
    );

    SourceRecord::new(RecordId::wikipedia(language, hit.pageid), title)
        .with_body(body)
        .with_published(
            hit.timestamp
                .as_deref()
                .map(Published::parse)
                .unwrap_or_default(),
        )
        .with_language(Some(language.to_string()))
        .with_hints(hints)
        .with_attribute("keyword", Value::from(term))
        .with_attribute("pageid", Value::from(hit.pageid))
        .with_attribute("wiki_url", Value::from(link))
}

/// Language codes become part of a hostname, so only plain codes pass.
pub fn is_valid_language(code: &str) -> bool {
    static RE_LANG: OnceCell<Regex> = OnceCell::new();
    let re = RE_LANG.get_or_init(|| Regex::new(r"^[a-z]{2,3}(?:-[a-z]{2,8})?$").unwrap());
    re.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes() {
        assert!(is_valid_language("en"));
        assert!(is_valid_language("zh-yue"));
        assert!(!is_valid_language(""));
        assert!(!is_valid_language("EN"));
        assert!(!is_valid_language("en.evil.com/"));
    }

    #[test]
    fn endpoint_substitutes_language() {
        let s = WikipediaSearch::new(reqwest::Client::new(), &WikipediaConfig::default(), Duration::from_secs(5));
        assert_eq!(s.endpoint("fr"), "https://fr.wikipedia.org/w/api.php");
    }
}
