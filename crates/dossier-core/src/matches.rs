use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityType;
use crate::layout::Geometry;

/// Identity of a match inside the corpus.
///
/// Field order is the navigation order: document, page, start offset, then
/// length and type as tie-breakers so the order is total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey {
    pub document_index: usize,
    pub page_number: u32,
    pub char_start: usize,
    pub char_length: usize,
    pub entity_type: EntityType,
}

/// One detected occurrence of an entity.
///
/// Created with geometry unresolved, resolved against the page's
/// [`TextLayoutIndex`](crate::layout::TextLayoutIndex), then frozen once it
/// is inserted into the corpus. Geometry depends on render scale and is never
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMatch {
    pub text: String,
    pub entity_type: EntityType,
    pub document_index: usize,
    /// 1-based.
    pub page_number: u32,
    pub char_start: usize,
    pub char_length: usize,
    #[serde(skip)]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("match text is empty")]
    EmptyText,
    #[error("match length is zero")]
    ZeroLength,
    #[error("page numbers are 1-based, got 0")]
    ZeroPage,
    #[error("match text {text:?} is {actual} chars but length says {expected}")]
    LengthMismatch {
        text: String,
        expected: usize,
        actual: usize,
    },
}

impl EntityMatch {
    pub fn new(
        text: impl Into<String>,
        entity_type: EntityType,
        document_index: usize,
        page_number: u32,
        char_start: usize,
        char_length: usize,
    ) -> Self {
        Self {
            text: text.into(),
            entity_type,
            document_index,
            page_number,
            char_start,
            char_length,
            geometry: None,
            sentence: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Option<Geometry>) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_sentence(mut self, sentence: impl Into<String>) -> Self {
        self.sentence = Some(sentence.into());
        self
    }

    pub fn key(&self) -> MatchKey {
        MatchKey {
            document_index: self.document_index,
            page_number: self.page_number,
            char_start: self.char_start,
            char_length: self.char_length,
            entity_type: self.entity_type.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.geometry.is_some()
    }

    /// Exclusive end offset in the page's flat text.
    pub fn char_end(&self) -> usize {
        self.char_start + self.char_length
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.text.is_empty() {
            return Err(MatchError::EmptyText);
        }
        if self.char_length == 0 {
            return Err(MatchError::ZeroLength);
        }
        if self.page_number == 0 {
            return Err(MatchError::ZeroPage);
        }
        let actual = self.text.chars().count();
        if actual != self.char_length {
            return Err(MatchError::LengthMismatch {
                text: self.text.clone(),
                expected: self.char_length,
                actual,
            });
        }
        Ok(())
    }
}
