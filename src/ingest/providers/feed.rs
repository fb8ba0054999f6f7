// src/ingest/providers/feed.rs
//! RSS 2.0 and Atom (alert feeds) → `SourceRecord`s.

use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::SourceFetchError;
use crate::ingest::hints::{push_unique, HintExtractor};
use crate::ingest::{normalize_body, normalize_text};
use crate::model::{GeoPoint, Published, RecordId, SourceRecord};

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    language: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
    source: Option<TextNode>,
    location: Option<String>,
    #[serde(rename = "georss:point", alias = "point")]
    point: Option<String>,
    #[serde(rename = "geo:lat", alias = "lat")]
    lat: Option<String>,
    #[serde(rename = "geo:long", alias = "long")]
    long: Option<String>,
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "@xml:lang", alias = "@lang")]
    lang: Option<String>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    content: Option<TextNode>,
    summary: Option<TextNode>,
    author: Option<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
    location: Option<String>,
    #[serde(rename = "georss:point", alias = "point")]
    point: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    text: String,
}

/// Fields shared by both formats, before hint extraction.
struct Entry {
    link: Option<String>,
    title: String,
    body: String,
    published: Option<String>,
    structured_location: Option<String>,
    metadata_fields: Vec<String>,
    point: Option<GeoPoint>,
}

/// Parse a feed document fetched from `feed_url`.
pub fn parse_feed(
    xml: &str,
    feed_url: &str,
    extractor: &dyn HintExtractor,
) -> Result<Vec<SourceRecord>, SourceFetchError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let (language, entries) = match sniff_root(&xml_clean) {
        Some(Root::Rss) => {
            let rss: Rss = from_str(&xml_clean).map_err(|e| SourceFetchError::parse("rss feed", e))?;
            let lang = rss.channel.language;
            (lang, rss.channel.items.into_iter().map(Entry::from).collect::<Vec<_>>())
        }
        Some(Root::Atom) => {
            let feed: AtomFeed =
                from_str(&xml_clean).map_err(|e| SourceFetchError::parse("atom feed", e))?;
            let lang = feed.lang;
            (lang, feed.entries.into_iter().map(Entry::from).collect::<Vec<_>>())
        }
        None => {
            return Err(SourceFetchError::parse(
                "feed",
                "document is neither RSS nor Atom",
            ))
        }
    };

    let mut out = Vec::with_capacity(entries.len());
    for e in entries {
        let Some(id) = e.link.as_deref().and_then(RecordId::from_url) else {
            debug!(feed = feed_url, title = %e.title, "skipping feed item without link");
            continue;
        };
        let title = normalize_text(&e.title);
        let body = normalize_body(&e.body);

        let mut hints = Vec::new();
        if let Some(loc) = &e.structured_location {
            push_unique(&mut hints, &normalize_text(loc));
        }
        for field in &e.metadata_fields {
            for h in extractor.extract(&normalize_text(field)) {
                push_unique(&mut hints, &h);
            }
        }
        for h in extractor.extract(&format!("{title}. {body}")) {
            push_unique(&mut hints, &h);
        }

        out.push(
            SourceRecord::new(id, title)
                .with_body(body)
                .with_published(
                    e.published
                        .as_deref()
                        .map(Published::parse)
                        .unwrap_or_default(),
                )
                .with_language(language.clone())
                .with_hints(hints)
                .with_embedded_point(e.point)
                .with_attribute("feed", Value::from(feed_url)),
        );
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    Ok(out)
}

enum Root {
    Rss,
    Atom,
}

fn sniff_root(xml: &str) -> Option<Root> {
    let rss = xml.find("<rss");
    let atom = xml.find("<feed");
    match (rss, atom) {
        (Some(r), Some(a)) if a < r => Some(Root::Atom),
        (Some(_), _) => Some(Root::Rss),
        (None, Some(_)) => Some(Root::Atom),
        (None, None) => None,
    }
}

impl From<RssItem> for Entry {
    fn from(it: RssItem) -> Self {
        let link = it
            .link
            .filter(|l| !l.trim().is_empty())
            .or_else(|| it.guid.map(|g| g.text));

        let mut metadata_fields: Vec<String> = Vec::new();
        metadata_fields.extend(it.author);
        metadata_fields.extend(it.categories);
        metadata_fields.extend(it.source.map(|s| s.text));

        let point = it
            .point
            .as_deref()
            .and_then(parse_georss_point)
            .or_else(|| match (it.lat.as_deref(), it.long.as_deref()) {
                (Some(lat), Some(lon)) => point_from_strs(lon, lat),
                _ => None,
            });

        Entry {
            link,
            title: it.title.unwrap_or_default(),
            body: it.description.unwrap_or_default(),
            published: it.pub_date,
            structured_location: it.location,
            metadata_fields,
            point,
        }
    }
}

impl From<AtomEntry> for Entry {
    fn from(it: AtomEntry) -> Self {
        let alternate = it
            .links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| it.links.first())
            .and_then(|l| l.href.clone());
        let link = alternate.or(it.id);

        let mut metadata_fields: Vec<String> = Vec::new();
        metadata_fields.extend(it.author.and_then(|a| a.name));
        metadata_fields.extend(it.categories.into_iter().filter_map(|c| c.term));

        Entry {
            link,
            title: it.title.map(|t| t.text).unwrap_or_default(),
            body: it
                .content
                .or(it.summary)
                .map(|t| t.text)
                .unwrap_or_default(),
            published: it.published.or(it.updated),
            structured_location: it.location,
            metadata_fields,
            point: it.point.as_deref().and_then(parse_georss_point),
        }
    }
}

/// `georss:point` is "lat lon", separated by whitespace.
fn parse_georss_point(raw: &str) -> Option<GeoPoint> {
    let mut parts = raw.split_whitespace();
    let lat = parts.next()?;
    let lon = parts.next()?;
    point_from_strs(lon, lat)
}

fn point_from_strs(lon: &str, lat: &str) -> Option<GeoPoint> {
    let lon = lon.trim().parse::<f64>().ok()?;
    let lat = lat.trim().parse::<f64>().ok()?;
    GeoPoint::new(lon, lat).ok()
}

/// XML has no HTML named entities; feeds still use them.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
