use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub mod analysis;
pub mod backend;
pub mod config_file;
pub mod corpus;
pub mod dossier;
pub mod entity;
pub mod extract;
pub mod extractor;
pub mod layout;
pub mod matches;
pub mod navigator;
pub mod project;
pub mod scan;
pub mod sentence;

// Re-export for convenience
pub use analysis::{ChronologyEntry, Connections, DocumentConnection, EventDate, SharedEntity};
pub use backend::{PageSource, PageSourceError, PageText};
pub use corpus::{CorpusMatchIndex, InsertSummary, Mention, RelocateSummary};
pub use dossier::{Dossier, DossierEntry, DossierSection};
pub use entity::{EntityType, TypeFilter};
pub use extract::custom::CustomTermMatcher;
pub use extract::service::ServiceBackend;
pub use extract::{BackendError, ExtractionBackend, RawEntity, RemoteTagger};
pub use extractor::{Availability, EntityExtractor, Extraction};
pub use layout::{Geometry, ResolveError, TextFragment, TextLayoutIndex, Transform};
pub use matches::{EntityMatch, MatchKey};
pub use navigator::MatchNavigator;
pub use project::{ProjectError, ProjectSnapshot};
pub use scan::{ScanController, ScanEvent, ScanPage, ScanRequest, ScanSummary, scan_corpus};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    PageSource(#[from] PageSourceError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// Runtime configuration for a search session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tagging service base URL. `None` means pattern matching only.
    pub service_url: Option<String>,
    pub timeout_secs: u64,
    pub enabled_types: TypeFilter,
    pub custom_term: Option<String>,
    /// Treat `custom_term` as a regular expression.
    pub custom_term_regex: bool,
    /// Match `custom_term` with exact case.
    pub case_sensitive: bool,
    pub bulk_batch_size: usize,
    /// Render scale applied to page geometry.
    pub scale: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: None,
            timeout_secs: extract::service::DEFAULT_TIMEOUT.as_secs(),
            enabled_types: TypeFilter::All,
            custom_term: None,
            custom_term_regex: false,
            case_sensitive: false,
            bulk_batch_size: scan::DEFAULT_BATCH_SIZE,
            scale: 1.0,
        }
    }
}

impl Config {
    /// Defaults overridden by whatever the config file sets.
    pub fn from_file(file: &config_file::ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(service) = &file.service {
            if let Some(url) = &service.url
                && !url.trim().is_empty()
            {
                config.service_url = Some(url.clone());
            }
            if let Some(secs) = service.timeout_secs {
                config.timeout_secs = secs;
            }
        }
        if let Some(search) = &file.search {
            if let Some(types) = &search.enabled_types {
                config.enabled_types = TypeFilter::parse(types);
            }
            config.custom_term = search.custom_term.clone();
            config.custom_term_regex = search.custom_term_regex.unwrap_or(false);
            config.case_sensitive = search.case_sensitive.unwrap_or(false);
            if let Some(size) = search.bulk_batch_size {
                config.bulk_batch_size = size.max(1);
            }
        }
        config
    }

    pub fn custom_matcher(&self) -> Option<CustomTermMatcher> {
        let term = self.custom_term.as_deref()?;
        let matcher = if self.custom_term_regex {
            CustomTermMatcher::pattern(term)
        } else {
            CustomTermMatcher::literal(term)
        };
        matcher.map(|m| m.with_case_sensitive(self.case_sensitive))
    }

    /// Extractor wired to the configured service and custom term.
    pub fn build_extractor(&self) -> EntityExtractor {
        let mut extractor = EntityExtractor::new().with_custom_term(self.custom_matcher());
        if let Some(url) = &self.service_url {
            let service = ServiceBackend::new(url.clone())
                .with_timeout(Duration::from_secs(self.timeout_secs.max(1)));
            extractor = extractor.with_remote(Arc::new(service));
        }
        extractor
    }

    pub fn scan_request(&self) -> ScanRequest {
        ScanRequest {
            enabled: self.enabled_types.clone(),
            batch_size: self.bulk_batch_size,
        }
    }
}

/// Read every page of a document from `source` into scan-ready layouts.
pub fn load_document(
    source: &dyn PageSource,
    path: &Path,
    document_index: usize,
    scale: f64,
) -> Result<Vec<ScanPage>, CoreError> {
    let pages = source.pages(path, scale)?;
    Ok(pages
        .into_iter()
        .map(|page| ScanPage {
            document_index,
            page_number: page.page_number,
            layout: page.layout(),
        })
        .collect())
}
