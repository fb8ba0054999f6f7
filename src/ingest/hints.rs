// src/ingest/hints.rs
//! Candidate place strings pulled out of item text.
//!
//! The pattern extractor is deliberately simple; an NLP entity extractor can
//! be plugged in through [`HintExtractor`].

use once_cell::sync::OnceCell;
use regex::Regex;

pub trait HintExtractor: Send + Sync {
    /// Candidate place names in order of appearance.
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Matches a preposition ("in", "at") followed by capitalised words,
/// e.g. "lodge opened in New York" → "New York".
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternHintExtractor;

impl HintExtractor for PatternHintExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        static RE_PLACE: OnceCell<Regex> = OnceCell::new();
        let re = RE_PLACE.get_or_init(|| {
            Regex::new(r"\b(?:[Ii]n|[Aa]t)\s+(\p{Lu}[\p{L}'\-]*(?:[ \t]+\p{Lu}[\p{L}'\-]*)*)")
                .unwrap()
        });

        let mut out = Vec::new();
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                push_unique(&mut out, m.as_str());
            }
        }
        out
    }
}

/// Append a trimmed hint unless it is empty or already present
/// (case-insensitive). Earlier hints keep priority.
pub fn push_unique(hints: &mut Vec<String>, candidate: &str) {
    let c = candidate.trim();
    if c.is_empty() {
        return;
    }
    if hints.iter().any(|h| h.eq_ignore_ascii_case(c)) {
        return;
    }
    hints.push(c.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_places_after_prepositions() {
        let x = PatternHintExtractor;
        assert_eq!(
            x.extract("Grand Lodge meeting held in New York City today"),
            vec!["New York City"]
        );
        assert_eq!(
            x.extract("Conference at Grand Lodge in Madrid"),
            vec!["Grand Lodge", "Madrid"]
        );
        assert_eq!(x.extract("Ceremony in Ávila"), vec!["Ávila"]);
    }

    #[test]
    fn ignores_lowercase_continuations_and_duplicates() {
        let x = PatternHintExtractor;
        assert!(x.extract("interest in history is growing").is_empty());
        assert_eq!(x.extract("in Paris, then again in Paris"), vec!["Paris"]);
    }

    #[test]
    fn push_unique_keeps_first_position() {
        let mut v = vec!["Lyon".to_string()];
        push_unique(&mut v, " lyon ");
        push_unique(&mut v, "");
        push_unique(&mut v, "Nice");
        assert_eq!(v, vec!["Lyon", "Nice"]);
    }
}
