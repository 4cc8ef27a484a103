//! Extraction adapter: picks the remote tagger when it is reachable, falls
//! back to the pattern backend when it is not, and always layers custom-term
//! hits on top.

use std::sync::{Arc, Mutex};

use crate::entity::TypeFilter;
use crate::extract::custom::CustomTermMatcher;
use crate::extract::pattern::PatternBackend;
use crate::extract::{BulkEntities, ExtractionBackend, PageRequest, RawEntity, RemoteTagger};

/// Cached result of the last availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Available,
    Unavailable,
}

/// Entities found on one page.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub entities: Vec<RawEntity>,
    /// Name of the backend that produced `entities`.
    pub backend: String,
    /// The remote tagger was configured but the pattern fallback answered.
    pub degraded: bool,
    pub fallback_reason: Option<String>,
}

/// Entities found on many pages in one pass.
#[derive(Debug, Clone)]
pub struct BulkExtraction {
    pub pages: BulkEntities,
    pub backend: String,
    pub degraded: bool,
    pub fallback_reason: Option<String>,
}

pub struct EntityExtractor {
    pattern: PatternBackend,
    remote: Option<Arc<dyn RemoteTagger>>,
    custom: Option<CustomTermMatcher>,
    availability: Mutex<Availability>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    /// Pattern-only extractor.
    pub fn new() -> Self {
        Self {
            pattern: PatternBackend::new(),
            remote: None,
            custom: None,
            availability: Mutex::new(Availability::Unknown),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteTagger>) -> Self {
        self.remote = Some(remote);
        self.set_availability(Availability::Unknown);
        self
    }

    pub fn with_custom_term(mut self, custom: Option<CustomTermMatcher>) -> Self {
        self.custom = custom;
        self
    }

    pub fn custom_term(&self) -> Option<&CustomTermMatcher> {
        self.custom.as_ref()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Last cached availability check.
    pub fn availability(&self) -> Availability {
        self.availability
            .lock()
            .map(|a| *a)
            .unwrap_or(Availability::Unknown)
    }

    fn set_availability(&self, availability: Availability) {
        if let Ok(mut a) = self.availability.lock() {
            *a = availability;
        }
    }

    /// Check the remote tagger and cache the answer. Without a remote tagger
    /// this is always `false`.
    pub async fn check_availability(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };
        let available = remote.check_availability().await;
        self.set_availability(if available {
            Availability::Available
        } else {
            Availability::Unavailable
        });
        available
    }

    /// The remote tagger, if configured and not known to be down. Checks once
    /// when nothing is cached yet.
    async fn usable_remote(&self) -> Result<Option<&Arc<dyn RemoteTagger>>, String> {
        let Some(remote) = &self.remote else {
            return Ok(None);
        };
        let ready = match self.availability() {
            Availability::Available => true,
            Availability::Unavailable => false,
            Availability::Unknown => self.check_availability().await,
        };
        if ready {
            Ok(Some(remote))
        } else {
            Err(format!("{} backend unavailable", remote.name()))
        }
    }

    fn pattern_result(&self, text: &str, enabled: &TypeFilter, reason: Option<String>) -> Extraction {
        Extraction {
            entities: self.pattern.find(text, enabled),
            backend: self.pattern.name().to_string(),
            degraded: reason.is_some(),
            fallback_reason: reason,
        }
    }

    /// Extract entities from one page's flat text.
    pub async fn extract_page(&self, text: &str, enabled: &TypeFilter) -> Extraction {
        let mut extraction = match self.usable_remote().await {
            Ok(Some(remote)) => match remote.extract(text, enabled).await {
                Ok(entities) => Extraction {
                    entities,
                    backend: remote.name().to_string(),
                    degraded: false,
                    fallback_reason: None,
                },
                Err(e) => {
                    tracing::warn!(backend = remote.name(), error = %e, "extraction failed, falling back to patterns");
                    self.set_availability(Availability::Unavailable);
                    self.pattern_result(text, enabled, Some(e.to_string()))
                }
            },
            Ok(None) => self.pattern_result(text, enabled, None),
            Err(reason) => self.pattern_result(text, enabled, Some(reason)),
        };
        self.finish(text, enabled, &mut extraction.entities);
        extraction
    }

    /// Extract entities from many pages, in one remote round trip when the
    /// tagger is reachable.
    pub async fn extract_pages(
        &self,
        pages: &[PageRequest<'_>],
        enabled: &TypeFilter,
    ) -> BulkExtraction {
        let fallback = |reason: Option<String>| BulkExtraction {
            pages: pages
                .iter()
                .map(|p| (p.id, self.pattern.find(p.text, enabled)))
                .collect(),
            backend: self.pattern.name().to_string(),
            degraded: reason.is_some(),
            fallback_reason: reason,
        };

        let mut bulk = match self.usable_remote().await {
            Ok(Some(remote)) => match remote.extract_bulk(pages, enabled).await {
                Ok(mut found) => {
                    // Pages the service skipped simply have no entities.
                    for page in pages {
                        found.entry(page.id).or_default();
                    }
                    found.retain(|id, _| pages.iter().any(|p| p.id == *id));
                    BulkExtraction {
                        pages: found,
                        backend: remote.name().to_string(),
                        degraded: false,
                        fallback_reason: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(backend = remote.name(), error = %e, "bulk extraction failed, falling back to patterns");
                    self.set_availability(Availability::Unavailable);
                    fallback(Some(e.to_string()))
                }
            },
            Ok(None) => fallback(None),
            Err(reason) => fallback(Some(reason)),
        };

        for page in pages {
            if let Some(entities) = bulk.pages.get_mut(&page.id) {
                self.finish(page.text, enabled, entities);
            }
        }
        bulk
    }

    /// Drop backend-produced custom hits, add custom-term hits, order by offset.
    fn finish(&self, text: &str, enabled: &TypeFilter, entities: &mut Vec<RawEntity>) {
        entities.retain(|e| !e.entity_type.is_custom() && enabled.contains(&e.entity_type));
        if let Some(custom) = &self.custom
            && enabled.contains(&crate::entity::EntityType::custom())
        {
            entities.extend(custom.find(text));
        }
        entities.sort_by(|a, b| {
            (a.char_start, a.char_length, &a.entity_type).cmp(&(
                b.char_start,
                b.char_length,
                &b.entity_type,
            ))
        });
    }
}
