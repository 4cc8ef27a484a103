use std::path::Path;

use mupdf::{Document, TextPageFlags};

use dossier_core::{PageSource, PageSourceError, PageText, TextFragment, Transform};

/// MuPDF-based implementation of [`PageSource`].
///
/// This crate is the sole AGPL island. It isolates the mupdf dependency
/// (which is AGPL-3.0) so that the core does not transitively depend on it.
///
/// Each text line becomes one fragment. Its transform is a translation to
/// the line's bottom-left corner in page space (y grows downward), so the
/// resolved top edge is `y1 - height`. Whitespace-only lines are dropped.
#[derive(Debug, Default)]
pub struct MupdfPageSource;

impl MupdfPageSource {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<Document, PageSourceError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| PageSourceError::OpenError("invalid path encoding".into()))?;
        Document::open(path_str).map_err(|e| PageSourceError::OpenError(e.to_string()))
    }
}

impl PageSource for MupdfPageSource {
    fn page_count(&self, path: &Path) -> Result<u32, PageSourceError> {
        count_pages(&Self::open(path)?)
    }

    fn page_text(
        &self,
        path: &Path,
        page_number: u32,
        scale: f64,
    ) -> Result<PageText, PageSourceError> {
        let document = Self::open(path)?;
        let count = count_pages(&document)?;
        if page_number == 0 || page_number > count {
            return Err(PageSourceError::PageOutOfRange {
                page: page_number,
                count,
            });
        }
        read_page(&document, page_number, scale)
    }

    fn pages(&self, path: &Path, scale: f64) -> Result<Vec<PageText>, PageSourceError> {
        let document = Self::open(path)?;
        let count = count_pages(&document)?;
        let pages = (1..=count)
            .map(|page| read_page(&document, page, scale))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(path = %path.display(), pages = count, "extracted document text");
        Ok(pages)
    }
}

fn count_pages(document: &Document) -> Result<u32, PageSourceError> {
    let count = document
        .page_count()
        .map_err(|e| PageSourceError::OpenError(e.to_string()))?;
    Ok(count.max(0) as u32)
}

fn read_page(
    document: &Document,
    page_number: u32,
    scale: f64,
) -> Result<PageText, PageSourceError> {
    let page_err = |e: mupdf::Error| PageSourceError::PageError {
        page: page_number,
        message: e.to_string(),
    };

    let page = document
        .load_page(page_number as i32 - 1)
        .map_err(page_err)?;
    let text_page = page
        .to_text_page(TextPageFlags::empty())
        .map_err(page_err)?;

    let mut fragments = Vec::new();
    for block in text_page.blocks() {
        for line in block.lines() {
            let text: String = line
                .chars()
                .map(|c| c.char().unwrap_or('\u{FFFD}'))
                .collect();
            if text.trim().is_empty() {
                continue;
            }
            let bounds = line.bounds();
            fragments.push(TextFragment::new(
                text,
                Transform::translate(bounds.x0 as f64, bounds.y1 as f64),
                (bounds.x1 - bounds.x0) as f64,
                (bounds.y1 - bounds.y0) as f64,
            ));
        }
    }

    Ok(PageText {
        page_number,
        scale,
        fragments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_open_error() {
        let err = MupdfPageSource::new()
            .page_count(Path::new("/nonexistent/file.pdf"))
            .unwrap_err();
        assert!(matches!(err, PageSourceError::OpenError(_)));
    }
}
