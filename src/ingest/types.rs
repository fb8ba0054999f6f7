// src/ingest/types.rs
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::SourceFetchError;
use crate::model::SourceRecord;

/// One unit of fan-out: a feed URL or a (search term, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceDescriptor {
    Feed { url: String },
    Search { term: String, language: String },
}

impl SourceDescriptor {
    pub fn feed(url: impl Into<String>) -> Self {
        SourceDescriptor::Feed { url: url.into() }
    }

    pub fn search(term: impl Into<String>, language: impl Into<String>) -> Self {
        SourceDescriptor::Search {
            term: term.into(),
            language: language.into(),
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Feed { url } => write!(f, "feed:{url}"),
            SourceDescriptor::Search { term, language } => write!(f, "search:{language}:{term}"),
        }
    }
}

/// Collaborator that turns a descriptor into normalized records with
/// ordered location hints.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, descriptor: &SourceDescriptor)
        -> Result<Vec<SourceRecord>, SourceFetchError>;
}
