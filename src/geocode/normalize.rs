// src/geocode/normalize.rs
use once_cell::sync::OnceCell;
use regex::Regex;

/// Canonical form of a location hint, used both as cache key and as the
/// provider query: ASCII-transliterated, lowercased, bracketed annotations
/// removed, whitespace collapsed.
pub fn normalize_hint(raw: &str) -> String {
    static RE_BRACKETS: OnceCell<Regex> = OnceCell::new();
    let re = RE_BRACKETS
        .get_or_init(|| Regex::new(r"\([^()]*\)|\[[^\[\]]*\]|\{[^{}]*\}").unwrap());

    // Transliterate first so full-width brackets become ASCII ones.
    let mut out = deunicode::deunicode(raw);

    // Innermost groups first until nothing is left to strip.
    loop {
        let next = re.replace_all(&out, " ").into_owned();
        if next == out {
            break;
        }
        out = next;
    }

    let collapsed = out
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    collapsed
        .trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '-' | '"' | '\'' | '/'))
        .trim()
        .to_string()
}
