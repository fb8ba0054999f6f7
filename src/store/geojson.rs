// src/store/geojson.rs
//! Dataset ⇄ GeoJSON FeatureCollection.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::model::{
    Dataset, GeoPoint, Located, Provenance, Published, RecordId, ResolvedRecord, SourceRecord,
    RESERVED_PROPERTIES,
};

pub fn encode(dataset: &Dataset) -> Value {
    let features: Vec<Value> = dataset.iter().map(encode_feature).collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn encode_feature(r: &ResolvedRecord) -> Value {
    let rec = r.record();
    let geometry = match r.point() {
        Some(p) => json!({ "type": "Point", "coordinates": [p.lon(), p.lat()] }),
        None => Value::Null,
    };

    let mut props = Map::new();
    props.insert("link".into(), Value::from(rec.id().as_str()));
    props.insert("title".into(), Value::from(rec.title()));
    props.insert("description".into(), Value::from(rec.body_text()));
    props.insert(
        "published".into(),
        rec.published()
            .to_rfc3339()
            .map(Value::from)
            .unwrap_or(Value::Null),
    );
    props.insert(
        "language".into(),
        rec.language().map(Value::from).unwrap_or(Value::Null),
    );
    props.insert(
        "location_hints".into(),
        Value::from(rec.location_hints().to_vec()),
    );
    props.insert("provenance".into(), Value::from(r.provenance().label()));
    for (k, v) in rec.attributes() {
        props.insert(k.clone(), v.clone());
    }

    json!({
        "type": "Feature",
        "id": rec.id().as_str(),
        "geometry": geometry,
        "properties": props,
    })
}

/// `None` when `doc` is not a FeatureCollection. A feature without `id` is
/// keyed by its canonicalized `link`; one with neither is skipped. An
/// out-of-range geometry is dropped and the record kept.
pub fn decode(doc: &Value) -> Option<Dataset> {
    if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return None;
    }
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut out = Dataset::new();
    for (idx, f) in features.iter().enumerate() {
        match decode_feature(f) {
            Some(r) => {
                out.insert(r);
            }
            None => warn!(index = idx, "skipping stored feature without id"),
        }
    }
    Some(out)
}

fn decode_feature(f: &Value) -> Option<ResolvedRecord> {
    let empty = Map::new();
    let props = f
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let id = f
        .get("id")
        .and_then(Value::as_str)
        .and_then(RecordId::new)
        .or_else(|| {
            props
                .get("link")
                .and_then(Value::as_str)
                .and_then(RecordId::from_url)
        })?;

    let text = |key: &str| props.get(key).and_then(Value::as_str).unwrap_or_default();

    let hints: Vec<String> = props
        .get("location_hints")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let point = match f.get("geometry") {
        None | Some(Value::Null) => None,
        Some(g) => {
            let p = decode_point(g);
            if p.is_none() {
                warn!(id = %id, "dropping invalid stored geometry");
            }
            p
        }
    };
    let provenance = Provenance::from_label(text("provenance"));

    let mut record = SourceRecord::new(id, text("title"))
        .with_body(text("description"))
        .with_published(Published::parse(text("published")))
        .with_language(
            props
                .get("language")
                .and_then(Value::as_str)
                .map(str::to_string),
        )
        .with_hints(hints);
    if provenance == Provenance::Feed {
        record = record.with_embedded_point(point);
    }
    for (k, v) in props {
        if !RESERVED_PROPERTIES.contains(&k.as_str()) {
            record = record.with_attribute(k.clone(), v.clone());
        }
    }

    let location = point.map(|point| Located { point, provenance });
    Some(ResolvedRecord::new(record, location))
}

fn decode_point(g: &Value) -> Option<GeoPoint> {
    if g.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    match g.get("coordinates").and_then(Value::as_array)?.as_slice() {
        [lon, lat, ..] => GeoPoint::new(lon.as_f64()?, lat.as_f64()?).ok(),
        _ => None,
    }
}
