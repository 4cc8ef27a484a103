//! Deterministic regex/lexicon backend. Always available; used as the fallback
//! whenever a remote tagger cannot answer.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{BackendFuture, ExtractionBackend, RawEntity, find_char_spans};
use crate::entity::{EntityType, TypeFilter};

/// A capitalised word, optionally followed by a second capitalised word.
static PEOPLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)?\b").unwrap());

static PLACES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:New York|London|Paris|Tokyo|Berlin|Rome|Beijing|Moscow|Los Angeles|Chicago|Sydney|Toronto|Madrid|Washington|Boston|San Francisco|Seattle|Atlanta)\b",
    )
    .unwrap()
});

static ORGANIZATIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Inc|Corp|LLC|Ltd|Association|Company|Organization|University|School|College)\b")
        .unwrap()
});

static DATES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December|(?:[12][0-9]|3[01]|0?[1-9])(?:st|nd|rd|th)|(?:19|20)[0-9]{2})\b",
    )
    .unwrap()
});

/// Rule set keyed by entity type.
pub struct PatternBackend {
    rules: Vec<(EntityType, &'static Regex)>,
}

impl Default for PatternBackend {
    fn default() -> Self {
        Self {
            rules: vec![
                (EntityType::people(), &*PEOPLE_RE),
                (EntityType::places(), &*PLACES_RE),
                (EntityType::organizations(), &*ORGANIZATIONS_RE),
                (EntityType::dates(), &*DATES_RE),
            ],
        }
    }
}

impl PatternBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous extraction; cannot fail.
    pub fn find(&self, page_text: &str, enabled: &TypeFilter) -> Vec<RawEntity> {
        let mut entities: Vec<RawEntity> = self
            .rules
            .iter()
            .filter(|(entity_type, _)| enabled.contains(entity_type))
            .flat_map(|(entity_type, re)| {
                find_char_spans(re, page_text)
                    .into_iter()
                    .map(move |span| {
                        RawEntity::new(span.text, entity_type.clone(), span.start, span.len)
                    })
            })
            .collect();
        entities.sort_by_key(|e| (e.char_start, e.char_length));
        entities
    }
}

impl ExtractionBackend for PatternBackend {
    fn name(&self) -> &str {
        "patterns"
    }

    fn extract<'a>(
        &'a self,
        page_text: &'a str,
        enabled: &'a TypeFilter,
    ) -> BackendFuture<'a, Vec<RawEntity>> {
        let entities = self.find(page_text, enabled);
        Box::pin(async move { Ok(entities) })
    }
}
