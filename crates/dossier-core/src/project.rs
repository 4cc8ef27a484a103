//! Project save/load.
//!
//! Geometry is never written: it depends on the render scale and is
//! recomputed with [`CorpusMatchIndex::relocate_page`] after the pages are
//! rendered again.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::corpus::{CorpusMatchIndex, InsertSummary};
use crate::matches::EntityMatch;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid project file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported project version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub index: usize,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub version: u32,
    pub documents: Vec<DocumentEntry>,
    pub matches: Vec<EntityMatch>,
}

impl ProjectSnapshot {
    pub fn capture(corpus: &CorpusMatchIndex) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            documents: corpus
                .documents()
                .map(|(index, title)| DocumentEntry {
                    index,
                    title: title.to_string(),
                })
                .collect(),
            matches: corpus.iter().cloned().collect(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ProjectError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Replace the corpus contents with this snapshot. Every match comes
    /// back unresolved.
    pub fn restore_into(self, corpus: &mut CorpusMatchIndex) -> InsertSummary {
        corpus.clear();
        for doc in self.documents {
            corpus.register_document(doc.index, doc.title);
        }
        corpus.insert(self.matches.into_iter().map(|m| m.with_geometry(None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityType, TypeFilter};
    use crate::layout::Geometry;

    fn corpus() -> CorpusMatchIndex {
        let mut corpus = CorpusMatchIndex::new();
        corpus.register_document(0, "report.pdf");
        corpus.insert([
            EntityMatch::new("Paris", EntityType::places(), 0, 1, 14, 5)
                .with_sentence("Alice went to Paris.")
                .with_geometry(Some(Geometry {
                    left: 90.0,
                    top: 90.0,
                    width: 35.0,
                    height: 10.0,
                })),
            EntityMatch::new("Alice", EntityType::people(), 0, 1, 0, 5),
        ]);
        corpus
    }

    #[test]
    fn save_and_load_drops_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        ProjectSnapshot::capture(&corpus()).save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("geometry"));

        let mut restored = CorpusMatchIndex::new();
        let summary = ProjectSnapshot::load(&path)
            .unwrap()
            .restore_into(&mut restored);
        assert_eq!(summary.inserted, 2);
        assert_eq!(restored.document_title(0), "report.pdf");
        assert!(restored.resolved(&TypeFilter::All).is_empty());
        let paris = &restored.filter(&TypeFilter::only(["places"]))[0];
        assert_eq!(paris.sentence.as_deref(), Some("Alice went to Paris."));
    }

    #[test]
    fn restore_replaces_existing_contents() {
        let mut target = CorpusMatchIndex::new();
        target.insert([EntityMatch::new("Bob", EntityType::people(), 3, 2, 0, 3)]);
        ProjectSnapshot::capture(&corpus()).restore_into(&mut target);
        assert_eq!(target.len(), 2);
        assert!(target.iter().all(|m| m.document_index == 0));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, r#"{"version": 99, "documents": [], "matches": []}"#).unwrap();
        assert!(matches!(
            ProjectSnapshot::load(&path),
            Err(ProjectError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn garbage_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(ProjectSnapshot::load(&path), Err(ProjectError::Json(_))));
    }
}
