//! Remote named-entity tagging service.
//!
//! Speaks the small JSON protocol of the NLP sidecar:
//!
//! - `GET  {base}/health`   → `{"status": "ok", "model": "..."}`
//! - `POST {base}/ner`      → `{"success": true, "entities": [...]}`
//! - `POST {base}/ner-bulk` → `{"success": true, "results": [{docIndex, pageNum, entities}]}`
//!
//! Entity offsets are code-point `start`/`end` pairs into the submitted text.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    BackendError, BackendFuture, BulkEntities, ExtractionBackend, PageId, PageRequest, RawEntity,
    RemoteTagger,
};
use crate::entity::{EntityType, TypeFilter};

/// Default request timeout for extraction calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the availability check.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP client for the tagging service.
pub struct ServiceBackend {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BulkRequest<'a> {
    pages: Vec<BulkPage<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkPage<'a> {
    doc_index: usize,
    page_num: u32,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    entities: Vec<WireEntity>,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<BulkPageResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkPageResult {
    doc_index: usize,
    page_num: u32,
    #[serde(default)]
    entities: Vec<WireEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntity {
    text: String,
    entity_type: String,
    start: usize,
    end: usize,
    #[serde(default)]
    sentence: Option<String>,
}

impl WireEntity {
    fn into_raw(self) -> Option<RawEntity> {
        if self.end <= self.start {
            tracing::debug!(text = %self.text, start = self.start, end = self.end, "dropping empty service span");
            return None;
        }
        Some(RawEntity {
            text: self.text,
            entity_type: EntityType::new(&self.entity_type),
            char_start: self.start,
            char_length: self.end - self.start,
            sentence: self.sentence.filter(|s| !s.trim().is_empty()),
        })
    }
}

fn convert(entities: Vec<WireEntity>, enabled: &TypeFilter) -> Vec<RawEntity> {
    entities
        .into_iter()
        .filter_map(WireEntity::into_raw)
        .filter(|e| enabled.contains(&e.entity_type))
        .collect()
}

fn check_success(success: Option<bool>, error: Option<String>) -> Result<(), BackendError> {
    match (success, error) {
        (Some(false), e) => Err(BackendError::Service(
            e.unwrap_or_else(|| "unknown error".to_string()),
        )),
        (None, Some(e)) => Err(BackendError::Service(e)),
        _ => Ok(()),
    }
}

impl ServiceBackend {
    /// Create a backend for the service at `base_url` (e.g., "http://localhost:5000/api").
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Query the health endpoint.
    pub async fn health(&self) -> Result<HealthResponse, BackendError> {
        let resp = self
            .client
            .get(self.endpoint("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BackendError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn post_ner(&self, text: &str, enabled: &TypeFilter) -> Result<Vec<RawEntity>, BackendError> {
        let resp = self
            .client
            .post(self.endpoint("ner"))
            .json(&NerRequest { text })
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BackendError::Status(resp.status().as_u16()));
        }
        let body: NerResponse = resp.json().await?;
        check_success(body.success, body.error)?;
        Ok(convert(body.entities, enabled))
    }

    async fn post_bulk(
        &self,
        pages: &[PageRequest<'_>],
        enabled: &TypeFilter,
    ) -> Result<BulkEntities, BackendError> {
        let request = BulkRequest {
            pages: pages
                .iter()
                .map(|p| BulkPage {
                    doc_index: p.id.document_index,
                    page_num: p.id.page_number,
                    text: p.text,
                })
                .collect(),
        };
        let resp = self
            .client
            .post(self.endpoint("ner-bulk"))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BackendError::Status(resp.status().as_u16()));
        }
        let body: BulkResponse = resp.json().await?;
        check_success(body.success, body.error)?;
        Ok(collect_bulk(body.results, enabled))
    }
}

fn collect_bulk(results: Vec<BulkPageResult>, enabled: &TypeFilter) -> BulkEntities {
    let mut out = BulkEntities::new();
    for page in results {
        let id = PageId {
            document_index: page.doc_index,
            page_number: page.page_num,
        };
        out.entry(id)
            .or_default()
            .extend(convert(page.entities, enabled));
    }
    out
}

impl ExtractionBackend for ServiceBackend {
    fn name(&self) -> &str {
        "service"
    }

    fn extract<'a>(
        &'a self,
        page_text: &'a str,
        enabled: &'a TypeFilter,
    ) -> BackendFuture<'a, Vec<RawEntity>> {
        Box::pin(self.post_ner(page_text, enabled))
    }
}

impl RemoteTagger for ServiceBackend {
    fn check_availability(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            match self.health().await {
                Ok(health) => {
                    tracing::info!(url = %self.base_url, model = ?health.model, "tagging service available");
                    true
                }
                Err(e) => {
                    tracing::warn!(url = %self.base_url, error = %e, "tagging service not available");
                    false
                }
            }
        })
    }

    fn extract_bulk<'a>(
        &'a self,
        pages: &'a [PageRequest<'a>],
        enabled: &'a TypeFilter,
    ) -> BackendFuture<'a, BulkEntities> {
        Box::pin(self.post_bulk(pages, enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_page_response() {
        let body: NerResponse = serde_json::from_str(
            r#"{"success": true, "entities": [
                {"text": "Paris", "entityType": "places", "start": 14, "end": 19,
                 "sentence": "Alice went to Paris.", "label": "GPE"},
                {"text": "Alice", "entityType": "people", "start": 0, "end": 5,
                 "sentence": "Alice went to Paris.", "label": "PERSON"}
            ]}"#,
        )
        .unwrap();
        check_success(body.success, body.error).unwrap();
        let entities = convert(body.entities, &TypeFilter::only(["places"]));
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].char_start, 14);
        assert_eq!(entities[0].char_length, 5);
        assert_eq!(entities[0].sentence.as_deref(), Some("Alice went to Paris."));
    }

    #[test]
    fn failure_payload_is_an_error() {
        let body: NerResponse =
            serde_json::from_str(r#"{"success": false, "error": "model not loaded"}"#).unwrap();
        let err = check_success(body.success, body.error).unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn bare_error_payload_is_an_error() {
        let body: NerResponse = serde_json::from_str(r#"{"error": "No text provided"}"#).unwrap();
        assert!(check_success(body.success, body.error).is_err());
    }

    #[test]
    fn empty_spans_are_dropped() {
        let body: NerResponse = serde_json::from_str(
            r#"{"success": true, "entities": [
                {"text": "", "entityType": "people", "start": 4, "end": 4}
            ]}"#,
        )
        .unwrap();
        assert!(convert(body.entities, &TypeFilter::All).is_empty());
    }

    #[test]
    fn bulk_results_keyed_by_page() {
        let body: BulkResponse = serde_json::from_str(
            r#"{"success": true, "results": [
                {"docIndex": 0, "pageNum": 1, "entities": [
                    {"text": "June", "entityType": "dates", "start": 3, "end": 7}
                ]},
                {"docIndex": 2, "pageNum": 5, "entities": []}
            ]}"#,
        )
        .unwrap();
        let bulk = collect_bulk(body.results, &TypeFilter::All);
        assert_eq!(bulk.len(), 2);
        let first = &bulk[&PageId {
            document_index: 0,
            page_number: 1,
        }];
        assert_eq!(first[0].entity_type, EntityType::dates());
        assert!(
            bulk[&PageId {
                document_index: 2,
                page_number: 5
            }]
            .is_empty()
        );
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let backend = ServiceBackend::new("http://localhost:5000/api/");
        assert_eq!(backend.endpoint("ner"), "http://localhost:5000/api/ner");
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let backend = ServiceBackend::new("http://127.0.0.1:9/api");
        assert!(!backend.check_availability().await);
    }
}
