//! Mock remote tagger for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{
    BackendError, BackendFuture, BulkEntities, ExtractionBackend, PageRequest, RawEntity,
    RemoteTagger,
};
use crate::entity::TypeFilter;

/// A configurable response for [`MockTagger`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return these entities for every page.
    Entities(Vec<RawEntity>),
    /// Fail with a service error.
    Error(String),
}

/// A hand-rolled [`RemoteTagger`] for tests.
///
/// Supports:
/// - A fixed availability answer, switchable at runtime.
/// - A fixed response for every call.
/// - Call counting for single-page, bulk, and availability-check calls.
pub struct MockTagger {
    available: AtomicBool,
    response: MockResponse,
    extract_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
    check_calls: AtomicUsize,
}

impl MockTagger {
    pub fn new(response: MockResponse) -> Self {
        Self {
            available: AtomicBool::new(true),
            response,
            extract_calls: AtomicUsize::new(0),
            bulk_calls: AtomicUsize::new(0),
            check_calls: AtomicUsize::new(0),
        }
    }

    /// A tagger that answers every availability check with "down".
    pub fn unavailable() -> Self {
        let tagger = Self::new(MockResponse::Entities(vec![]));
        tagger.set_available(false);
        tagger
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, enabled: &TypeFilter) -> Result<Vec<RawEntity>, BackendError> {
        match &self.response {
            MockResponse::Entities(entities) => Ok(entities
                .iter()
                .filter(|e| enabled.contains(&e.entity_type))
                .cloned()
                .collect()),
            MockResponse::Error(msg) => Err(BackendError::Service(msg.clone())),
        }
    }
}

impl ExtractionBackend for MockTagger {
    fn name(&self) -> &str {
        "mock"
    }

    fn extract<'a>(
        &'a self,
        _page_text: &'a str,
        enabled: &'a TypeFilter,
    ) -> BackendFuture<'a, Vec<RawEntity>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.answer(enabled);
        Box::pin(async move { result })
    }
}

impl RemoteTagger for MockTagger {
    fn check_availability(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        let available = self.available.load(Ordering::SeqCst);
        Box::pin(async move { available })
    }

    fn extract_bulk<'a>(
        &'a self,
        pages: &'a [PageRequest<'a>],
        enabled: &'a TypeFilter,
    ) -> BackendFuture<'a, BulkEntities> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.answer(enabled).map(|entities| {
            pages
                .iter()
                .map(|p| (p.id, entities.clone()))
                .collect::<BulkEntities>()
        });
        Box::pin(async move { result })
    }
}
