// src/ingest/mod.rs
pub mod hints;
pub mod priority;
pub mod providers;
pub mod types;
pub mod worker;

use once_cell::sync::OnceCell;
use regex::Regex;

/// Upper bound on stored body text, in characters.
pub const MAX_BODY_CHARS: usize = 5000;

/// Normalize feed text: decode entities, drop markup, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (alert feeds wrap matched terms in <b>)
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").into_owned();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").into_owned();
    out.trim().to_string()
}

/// [`normalize_text`] capped at [`MAX_BODY_CHARS`].
pub fn normalize_body(s: &str) -> String {
    let out = normalize_text(s);
    if out.chars().count() > MAX_BODY_CHARS {
        out.chars().take(MAX_BODY_CHARS).collect()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  Lodge&nbsp;&nbsp;opens <b>in</b>\n Lyon!  ";
        assert_eq!(normalize_text(s), "Lodge opens in Lyon!");
    }

    #[test]
    fn normalize_text_folds_typographic_quotes() {
        assert_eq!(normalize_text("\u{201C}Hi\u{201D} it\u{2019}s"), "\"Hi\" it's");
    }

    #[test]
    fn body_is_capped() {
        let long = "a".repeat(MAX_BODY_CHARS + 10);
        assert_eq!(normalize_body(&long).chars().count(), MAX_BODY_CHARS);
        assert_eq!(normalize_body("short"), "short");
    }
}
