use std::path::Path;

use thiserror::Error;

use crate::layout::{TextFragment, TextLayoutIndex};

#[derive(Error, Debug)]
pub enum PageSourceError {
    #[error("failed to open document: {0}")]
    OpenError(String),
    #[error("failed to extract page {page}: {message}")]
    PageError { page: u32, message: String },
    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Positioned text of one rendered page.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based.
    pub page_number: u32,
    pub scale: f64,
    pub fragments: Vec<TextFragment>,
}

impl PageText {
    pub fn layout(self) -> TextLayoutIndex {
        TextLayoutIndex::build_scaled(self.fragments, self.scale)
    }
}

/// Trait for page text sources.
///
/// Implementors turn a document into per-page fragment sequences; the
/// offset table, extraction and indexing live in this crate. A returned
/// sequence is stable until the same page is rendered again.
pub trait PageSource: Send + Sync {
    fn page_count(&self, path: &Path) -> Result<u32, PageSourceError>;

    /// Fragments of one page (1-based) at the given render scale.
    fn page_text(&self, path: &Path, page_number: u32, scale: f64)
    -> Result<PageText, PageSourceError>;

    /// Every page of the document, in order.
    fn pages(&self, path: &Path, scale: f64) -> Result<Vec<PageText>, PageSourceError> {
        let count = self.page_count(path)?;
        (1..=count)
            .map(|page| self.page_text(path, page, scale))
            .collect()
    }
}
