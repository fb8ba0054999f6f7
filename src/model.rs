// src/model.rs
//! Records flowing through the pipeline: validated coordinates, stable ids,
//! fetched and resolved records, and the id-keyed dataset.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use url::Url;

use crate::errors::CoordinateError;

/// Property names owned by the record itself. Attributes never shadow them.
pub const RESERVED_PROPERTIES: &[&str] = &[
    "link",
    "title",
    "description",
    "published",
    "language",
    "location_hints",
    "provenance",
];

/// A WGS84 (longitude, latitude) pair that is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint", into = "RawPoint")]
pub struct GeoPoint {
    lon: f64,
    lat: f64,
}

#[derive(Serialize, Deserialize)]
struct RawPoint {
    lon: f64,
    lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Result<Self, CoordinateError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(CoordinateError::NotFinite { lon, lat });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        Ok(Self { lon, lat })
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = CoordinateError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lon, raw.lat)
    }
}

impl From<GeoPoint> for RawPoint {
    fn from(p: GeoPoint) -> Self {
        RawPoint {
            lon: p.lon,
            lat: p.lat,
        }
    }
}

/// Stable identifier of a record; the only merge key.
///
/// Source records get a canonical URL (see [`RecordId::from_url`]); ids read
/// back from an existing dataset are taken verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Trimmed, non-empty id taken as-is.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let t = raw.as_ref().trim();
        if t.is_empty() {
            None
        } else {
            Some(Self(t.to_string()))
        }
    }

    /// Canonical URL id. Falls back to the trimmed text when `raw` is not
    /// an absolute URL.
    pub fn from_url(raw: &str) -> Option<Self> {
        match canonical_url(raw) {
            Some(u) => Some(Self(u)),
            None => Self::new(raw),
        }
    }

    /// Id for an encyclopedia page: language edition + numeric page id.
    pub fn wikipedia(lang: &str, page_id: u64) -> Self {
        Self(format!("https://{lang}.wikipedia.org/?curid={page_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalize a source link: unwrap search-engine redirect links, drop
/// the fragment and `utm_*` tracking parameters.
pub fn canonical_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if let Some(target) = unwrap_redirect(&url) {
        url = target;
    }
    url.set_fragment(None);

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<(String, String)> = pairs
        .iter()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .cloned()
        .collect();
    if kept.len() != pairs.len() {
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    } else if url.query() == Some("") {
        url.set_query(None);
    }
    Some(url.to_string())
}

fn unwrap_redirect(url: &Url) -> Option<Url> {
    let host = url.host_str()?;
    let is_google = host == "google.com" || host.ends_with(".google.com");
    if !is_google || url.path() != "/url" {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "url" || k == "q")
        .and_then(|(_, v)| Url::parse(&v).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// Publication time of a record, when the source gives a parseable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Published {
    At(DateTime<Utc>),
    #[default]
    Unknown,
}

impl Published {
    /// Accepts RFC 3339 (Atom, MediaWiki) and RFC 2822 (RSS `pubDate`).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Published::Unknown;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Published::At(dt.with_timezone(&Utc));
        }
        OffsetDateTime::parse(raw, &Rfc2822)
            .ok()
            .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
            .map(Published::At)
            .unwrap_or(Published::Unknown)
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Published::At(dt) => Some(*dt),
            Published::Unknown => None,
        }
    }

    pub fn to_rfc3339(&self) -> Option<String> {
        self.as_datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

/// One item as delivered by a source, before location resolution.
///
/// Built once by the fetching collaborator through the `with_*` methods and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    id: RecordId,
    title: String,
    body_text: String,
    published: Published,
    language: Option<String>,
    location_hints: Vec<String>,
    embedded_point: Option<GeoPoint>,
    attributes: Map<String, Value>,
}

impl SourceRecord {
    pub fn new(id: RecordId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body_text: String::new(),
            published: Published::Unknown,
            language: None,
            location_hints: Vec::new(),
            embedded_point: None,
            attributes: Map::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_text = body.into();
        self
    }

    pub fn with_published(mut self, published: Published) -> Self {
        self.published = published;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self
    }

    /// Hints are kept in the given order (most specific first).
    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.location_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    /// Coordinates carried by the source itself (e.g. `georss:point`).
    pub fn with_embedded_point(mut self, point: Option<GeoPoint>) -> Self {
        self.embedded_point = point;
        self
    }

    /// Free-form metadata. Reserved property names are ignored.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if RESERVED_PROPERTIES.contains(&key.as_str()) {
            tracing::debug!(%key, id = %self.id, "ignoring reserved attribute name");
            return self;
        }
        self.attributes.insert(key, value);
        self
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn published(&self) -> Published {
        self.published
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn location_hints(&self) -> &[String] {
        &self.location_hints
    }

    pub fn embedded_point(&self) -> Option<GeoPoint> {
        self.embedded_point
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

/// Where a record's coordinate came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// A named geocoding provider answered.
    Provider(String),
    Cache,
    /// Coordinates embedded in the source item.
    Feed,
    None,
}

impl Provenance {
    pub fn label(&self) -> &str {
        match self {
            Provenance::Provider(name) => name,
            Provenance::Cache => "cache",
            Provenance::Feed => "feed",
            Provenance::None => "none",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "" | "none" => Provenance::None,
            "cache" => Provenance::Cache,
            "feed" => Provenance::Feed,
            other => Provenance::Provider(other.to_string()),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A coordinate together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub point: GeoPoint,
    pub provenance: Provenance,
}

/// A source record after location resolution: it has a valid point or none.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    record: SourceRecord,
    location: Option<Located>,
}

impl ResolvedRecord {
    pub fn new(record: SourceRecord, location: Option<Located>) -> Self {
        Self { record, location }
    }

    pub fn unlocated(record: SourceRecord) -> Self {
        Self::new(record, None)
    }

    pub fn id(&self) -> &RecordId {
        self.record.id()
    }

    pub fn record(&self) -> &SourceRecord {
        &self.record
    }

    pub fn location(&self) -> Option<&Located> {
        self.location.as_ref()
    }

    pub fn point(&self) -> Option<GeoPoint> {
        self.location.as_ref().map(|l| l.point)
    }

    pub fn provenance(&self) -> &Provenance {
        self.location
            .as_ref()
            .map(|l| &l.provenance)
            .unwrap_or(&Provenance::None)
    }
}

/// Records keyed by id. Ordered so the persisted file is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: BTreeMap<RecordId, ResolvedRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the replaced record.
    pub fn insert(&mut self, record: ResolvedRecord) -> Option<ResolvedRecord> {
        self.records.insert(record.id().clone(), record)
    }

    pub fn get(&self, id: &RecordId) -> Option<&ResolvedRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn located_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.location().is_some())
            .count()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedRecord> {
        self.records.values()
    }
}

impl FromIterator<ResolvedRecord> for Dataset {
    fn from_iter<T: IntoIterator<Item = ResolvedRecord>>(iter: T) -> Self {
        let mut ds = Dataset::new();
        for r in iter {
            ds.insert(r);
        }
        ds
    }
}

impl IntoIterator for Dataset {
    type Item = ResolvedRecord;
    type IntoIter = std::collections::btree_map::IntoValues<RecordId, ResolvedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}
