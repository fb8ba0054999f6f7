// src/ingest/priority.rs
use serde_json::Value;

use crate::config::PriorityTerm;
use crate::model::SourceRecord;

const BASE_PRIORITY: i64 = 1;

/// Title keywords that mark a record as more relevant. Informational: the
/// merge never looks at it.
#[derive(Debug, Clone, Default)]
pub struct PriorityTerms {
    // (lowercased term, weight) in configured order
    terms: Vec<(String, i64)>,
}

impl PriorityTerms {
    pub fn new(terms: &[PriorityTerm]) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|t| (t.term.trim().to_lowercase(), t.weight))
                .filter(|(t, _)| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Weight of the first configured term contained in `title`.
    pub fn score(&self, title: &str) -> i64 {
        let lower = title.to_lowercase();
        self.terms
            .iter()
            .find(|(t, _)| lower.contains(t.as_str()))
            .map(|(_, w)| *w)
            .unwrap_or(BASE_PRIORITY)
    }

    /// Adds a `priority` attribute unless no terms are configured.
    pub fn tag(&self, record: SourceRecord) -> SourceRecord {
        if self.is_empty() {
            return record;
        }
        let score = self.score(record.title());
        record.with_attribute("priority", Value::from(score))
    }
}
