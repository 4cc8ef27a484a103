//! Corpus-wide scan: extract every page, place the hits, index them.
//!
//! A scan is the only writer to the corpus while it runs. Starting a new one
//! through [`ScanController::begin`] cancels the previous one first.
//! Cancellation is checked before each batch and before each page insert;
//! whatever was inserted before that point stays in the corpus.

use tokio_util::sync::CancellationToken;

use crate::corpus::CorpusMatchIndex;
use crate::entity::TypeFilter;
use crate::extract::{PageId, PageRequest, RawEntity};
use crate::extractor::EntityExtractor;
use crate::layout::{ResolveError, TextLayoutIndex};
use crate::matches::EntityMatch;
use crate::sentence::SentenceIndex;

/// Default number of pages sent per bulk extraction call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// One page ready for scanning.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub document_index: usize,
    /// 1-based.
    pub page_number: u32,
    pub layout: TextLayoutIndex,
}

impl ScanPage {
    pub fn id(&self) -> PageId {
        PageId {
            document_index: self.document_index,
            page_number: self.page_number,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub enabled: TypeFilter,
    pub batch_size: usize,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            enabled: TypeFilter::All,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Progress events emitted during a scan.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    PageScanned {
        document_index: usize,
        page_number: u32,
        /// 0-based position of the page in the scan.
        index: usize,
        total: usize,
        inserted: usize,
    },
    /// The pattern fallback answered instead of the remote tagger.
    /// Emitted once per scan.
    Degraded { reason: String },
    Cancelled { pages_scanned: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub pages_scanned: usize,
    pub matches_inserted: usize,
    /// Stored without geometry.
    pub unresolved: usize,
    /// Dropped: out of range, invalid or non-monotonic.
    pub rejected: usize,
    pub degraded: bool,
    pub cancelled: bool,
}

/// Owns the token of the in-flight scan.
#[derive(Debug, Default)]
pub struct ScanController {
    current: Option<CancellationToken>,
}

impl ScanController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any running scan and hand out a token for the next one.
    pub fn begin(&mut self) -> CancellationToken {
        self.cancel();
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        token
    }

    /// Cancel the running scan, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

/// Scan `pages` and insert every placed hit into `corpus`.
pub async fn scan_corpus(
    pages: &[ScanPage],
    extractor: &EntityExtractor,
    request: &ScanRequest,
    corpus: &mut CorpusMatchIndex,
    cancel: &CancellationToken,
    progress: impl Fn(ScanEvent),
) -> ScanSummary {
    let total = pages.len();
    let batch_size = request.batch_size.max(1);
    let mut summary = ScanSummary::default();

    'batches: for (batch_idx, batch) in pages.chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let requests: Vec<PageRequest<'_>> = batch
            .iter()
            .map(|p| PageRequest {
                id: p.id(),
                text: p.layout.flat_text(),
            })
            .collect();

        let mut bulk = tokio::select! {
            _ = cancel.cancelled() => {
                summary.cancelled = true;
                break 'batches;
            }
            bulk = extractor.extract_pages(&requests, &request.enabled) => bulk,
        };

        if bulk.degraded && !summary.degraded {
            summary.degraded = true;
            let reason = bulk
                .fallback_reason
                .clone()
                .unwrap_or_else(|| "remote tagger unavailable".to_string());
            tracing::warn!(reason = %reason, "scanning with pattern fallback");
            progress(ScanEvent::Degraded { reason });
        }

        for (offset, page) in batch.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break 'batches;
            }
            let raw = bulk.pages.remove(&page.id()).unwrap_or_default();
            let placed = place_entities(page, raw, &mut summary);
            let outcome = corpus.insert(placed);
            summary.matches_inserted += outcome.inserted;
            summary.rejected += outcome.rejected;
            summary.pages_scanned += 1;

            progress(ScanEvent::PageScanned {
                document_index: page.document_index,
                page_number: page.page_number,
                index: batch_idx * batch_size + offset,
                total,
                inserted: outcome.inserted,
            });
        }
    }

    if summary.cancelled {
        tracing::info!(pages = summary.pages_scanned, total, "scan cancelled");
        progress(ScanEvent::Cancelled {
            pages_scanned: summary.pages_scanned,
        });
    } else {
        tracing::info!(
            pages = summary.pages_scanned,
            inserted = summary.matches_inserted,
            unresolved = summary.unresolved,
            rejected = summary.rejected,
            degraded = summary.degraded,
            "scan complete"
        );
    }
    summary
}

/// Turn raw hits into matches with geometry and sentence context.
fn place_entities(
    page: &ScanPage,
    raw: Vec<RawEntity>,
    summary: &mut ScanSummary,
) -> Vec<EntityMatch> {
    let flat = page.layout.flat_text();
    let sentences = SentenceIndex::new(flat);
    let mut placed = Vec::with_capacity(raw.len());

    for entity in raw {
        let in_range = entity
            .char_start
            .checked_add(entity.char_length)
            .is_some_and(|end| end <= sentences.char_len());
        if !in_range {
            tracing::debug!(
                start = entity.char_start,
                length = entity.char_length,
                text = %entity.text,
                "dropping match outside the page text"
            );
            summary.rejected += 1;
            continue;
        }

        let geometry = match page.layout.locate(entity.char_start, entity.char_length) {
            Ok(g) => Some(g),
            Err(ResolveError::Unresolvable { .. }) => {
                summary.unresolved += 1;
                None
            }
            Err(e @ ResolveError::NonMonotonic { .. }) => {
                tracing::debug!(error = %e, text = %entity.text, "dropping match");
                summary.rejected += 1;
                continue;
            }
        };

        let text = char_slice(flat, entity.char_start, entity.char_length)
            .map(str::to_string)
            .unwrap_or(entity.text);
        let sentence = entity
            .sentence
            .unwrap_or_else(|| sentences.sentence_around(entity.char_start, entity.char_length));

        let m = EntityMatch::new(
            text,
            entity.entity_type,
            page.document_index,
            page.page_number,
            entity.char_start,
            entity.char_length,
        )
        .with_geometry(geometry);
        placed.push(if sentence.is_empty() {
            m
        } else {
            m.with_sentence(sentence)
        });
    }
    placed
}

/// The `len` chars starting at char offset `start`, if all of them exist.
fn char_slice(text: &str, start: usize, len: usize) -> Option<&str> {
    let mut indices = text.char_indices().map(|(i, _)| i).chain([text.len()]);
    let begin = indices.nth(start)?;
    let end = if len == 0 {
        begin
    } else {
        indices.nth(len - 1)?
    };
    Some(&text[begin..end])
}
