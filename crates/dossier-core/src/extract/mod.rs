//! Extraction backend trait and implementations.
//!
//! Backends consume a page's flat text and return character offsets into
//! exactly that string. They never see DOM or canvas state.

pub mod custom;
pub mod mock;
pub mod pattern;
pub mod service;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use regex::Regex;
use thiserror::Error;

use crate::entity::{EntityType, TypeFilter};

/// A backend hit before it is placed in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntity {
    pub text: String,
    pub entity_type: EntityType,
    pub char_start: usize,
    pub char_length: usize,
    /// Sentence context when the backend supplies one.
    pub sentence: Option<String>,
}

impl RawEntity {
    pub fn new(
        text: impl Into<String>,
        entity_type: EntityType,
        char_start: usize,
        char_length: usize,
    ) -> Self {
        Self {
            text: text.into(),
            entity_type,
            char_start,
            char_length,
            sentence: None,
        }
    }
}

/// Identifies one page of one document in a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId {
    pub document_index: usize,
    pub page_number: u32,
}

/// Flat text of one page submitted for extraction.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'t> {
    pub id: PageId,
    pub text: &'t str,
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tagging service returned HTTP {0}")]
    Status(u16),
    #[error("tagging service reported failure: {0}")]
    Service(String),
}

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Per-page results of a bulk extraction.
pub type BulkEntities = BTreeMap<PageId, Vec<RawEntity>>;

/// An entity extraction backend.
pub trait ExtractionBackend: Send + Sync {
    /// Short name for logs and status reporting (e.g., "patterns").
    fn name(&self) -> &str;

    /// Extract entities of the enabled types from one page's flat text.
    fn extract<'a>(
        &'a self,
        page_text: &'a str,
        enabled: &'a TypeFilter,
    ) -> BackendFuture<'a, Vec<RawEntity>>;
}

/// A backend living behind a network boundary.
///
/// Remote taggers can be down, so callers check them and batch pages to keep
/// round trips low.
pub trait RemoteTagger: ExtractionBackend {
    /// Check the service. Never errors; unreachable means `false`.
    fn check_availability(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    /// Extract entities for many pages in one round trip.
    fn extract_bulk<'a>(
        &'a self,
        pages: &'a [PageRequest<'a>],
        enabled: &'a TypeFilter,
    ) -> BackendFuture<'a, BulkEntities>;
}

/// A regex hit with offsets converted from bytes to `char`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CharSpan<'t> {
    pub start: usize,
    pub len: usize,
    pub text: &'t str,
}

/// Run `re` over `text` and report non-empty hits in `char` offsets.
pub(crate) fn find_char_spans<'t>(re: &Regex, text: &'t str) -> Vec<CharSpan<'t>> {
    let mut spans = Vec::new();
    let mut byte_cursor = 0;
    let mut char_cursor = 0;
    for m in re.find_iter(text) {
        char_cursor += text[byte_cursor..m.start()].chars().count();
        let len = m.as_str().chars().count();
        if len > 0 {
            spans.push(CharSpan {
                start: char_cursor,
                len,
                text: m.as_str(),
            });
        }
        char_cursor += len;
        byte_cursor = m.end();
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_spans_skip_multibyte_prefix() {
        let re = Regex::new("Paris").unwrap();
        let spans = find_char_spans(&re, "Zürich und Paris");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 11);
        assert_eq!(spans[0].len, 5);
    }

    #[test]
    fn char_spans_drop_empty_matches() {
        let re = Regex::new("x*").unwrap();
        let spans = find_char_spans(&re, "aaxxa");
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].len), (2, 2));
    }
}
