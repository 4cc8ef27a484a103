//! Cross-document match index.
//!
//! Holds every [`EntityMatch`] of the open corpus, keyed by [`MatchKey`].
//! Insertion is idempotent on the key and iteration follows the key order,
//! which is the navigation order (document, page, start offset).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::{EntityType, TypeFilter};
use crate::layout::TextLayoutIndex;
use crate::matches::{EntityMatch, MatchKey};

/// One mention of an entity in the dossier view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub sentence: String,
    pub document_title: String,
}

/// Mentions grouped by entity type and lowercase text.
pub type MentionGroups = BTreeMap<(EntityType, String), Vec<Mention>>;

/// Outcome of an [`CorpusMatchIndex::insert`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub inserted: usize,
    pub duplicates: usize,
    /// Matches that failed validation and were not stored.
    pub rejected: usize,
}

/// Outcome of re-resolving one page after a re-render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocateSummary {
    pub resolved: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CorpusMatchIndex {
    matches: BTreeMap<MatchKey, EntityMatch>,
    titles: BTreeMap<usize, String>,
}

impl CorpusMatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document's display title.
    pub fn register_document(&mut self, document_index: usize, title: impl Into<String>) {
        self.titles.insert(document_index, title.into());
    }

    /// Display title, or `"Document N"` (1-based) when none was registered.
    pub fn document_title(&self, document_index: usize) -> String {
        self.titles
            .get(&document_index)
            .cloned()
            .unwrap_or_else(|| format!("Document {}", document_index + 1))
    }

    /// Registered documents in index order.
    pub fn documents(&self) -> impl Iterator<Item = (usize, &str)> {
        self.titles.iter().map(|(i, t)| (*i, t.as_str()))
    }

    /// Insert matches, skipping duplicates and invalid ones.
    pub fn insert<I>(&mut self, matches: I) -> InsertSummary
    where
        I: IntoIterator<Item = EntityMatch>,
    {
        let mut summary = InsertSummary::default();
        for m in matches {
            if let Err(e) = m.validate() {
                tracing::debug!(error = %e, document = m.document_index, page = m.page_number, "rejecting invalid match");
                summary.rejected += 1;
                continue;
            }
            let key = m.key();
            if self.matches.contains_key(&key) {
                summary.duplicates += 1;
                continue;
            }
            self.matches.insert(key, m);
            summary.inserted += 1;
        }
        summary
    }

    /// Purge every match of a document. Other documents keep their indices.
    pub fn remove_document(&mut self, document_index: usize) -> usize {
        let before = self.matches.len();
        self.matches
            .retain(|key, _| key.document_index != document_index);
        self.titles.remove(&document_index);
        before - self.matches.len()
    }

    /// Drop all matches and titles.
    pub fn clear(&mut self) {
        self.matches.clear();
        self.titles.clear();
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, key: &MatchKey) -> Option<&EntityMatch> {
        self.matches.get(key)
    }

    /// Matches of the enabled types, in navigation order.
    pub fn filter(&self, enabled: &TypeFilter) -> Vec<&EntityMatch> {
        self.matches
            .values()
            .filter(|m| enabled.contains(&m.entity_type))
            .collect()
    }

    /// Like [`filter`](Self::filter) but only matches with geometry.
    pub fn resolved(&self, enabled: &TypeFilter) -> Vec<&EntityMatch> {
        self.matches
            .values()
            .filter(|m| m.is_resolved() && enabled.contains(&m.entity_type))
            .collect()
    }

    pub fn matches_on_page(
        &self,
        document_index: usize,
        page_number: u32,
    ) -> impl Iterator<Item = &EntityMatch> {
        self.matches
            .values()
            .filter(move |m| m.document_index == document_index && m.page_number == page_number)
    }

    pub fn count_by_type(&self) -> BTreeMap<EntityType, usize> {
        let mut counts = BTreeMap::new();
        for m in self.matches.values() {
            *counts.entry(m.entity_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Group mentions by (type, lowercase text). Mentions within a group are
    /// unique per (sentence, document title); matches without sentence
    /// context are left out.
    pub fn group_by_normalized_text(&self, enabled: &TypeFilter) -> MentionGroups {
        let mut groups = MentionGroups::new();
        for m in self.filter(enabled) {
            let Some(sentence) = m.sentence.as_deref() else {
                continue;
            };
            let mention = Mention {
                sentence: sentence.to_string(),
                document_title: self.document_title(m.document_index),
            };
            let mentions = groups
                .entry((m.entity_type.clone(), m.text.to_lowercase()))
                .or_default();
            if !mentions.contains(&mention) {
                mentions.push(mention);
            }
        }
        groups
    }

    /// Re-resolve every match on a page against a freshly built layout index.
    ///
    /// Each match is replaced by a new value carrying the new geometry;
    /// matches that no longer resolve become unresolved.
    pub fn relocate_page(
        &mut self,
        document_index: usize,
        page_number: u32,
        layout: &TextLayoutIndex,
    ) -> RelocateSummary {
        let mut summary = RelocateSummary::default();
        let relocated: Vec<EntityMatch> = self
            .matches_on_page(document_index, page_number)
            .map(|m| {
                let geometry = layout.resolve(m.char_start, m.char_length);
                m.clone().with_geometry(geometry)
            })
            .collect();
        for m in relocated {
            if m.is_resolved() {
                summary.resolved += 1;
            } else {
                summary.unresolved += 1;
            }
            self.matches.insert(m.key(), m);
        }
        summary
    }

    /// All matches in navigation order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityMatch> {
        self.matches.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{TextFragment, Transform};

    fn m(doc: usize, page: u32, ty: EntityType, start: usize, text: &str) -> EntityMatch {
        EntityMatch::new(text, ty, doc, page, start, text.chars().count())
    }

    fn sample() -> CorpusMatchIndex {
        let mut corpus = CorpusMatchIndex::new();
        corpus.insert([
            m(1, 1, EntityType::places(), 14, "Paris"),
            m(0, 2, EntityType::people(), 0, "Alice"),
            m(0, 1, EntityType::dates(), 30, "1999"),
            m(2, 1, EntityType::people(), 4, "Bob"),
            m(0, 1, EntityType::people(), 0, "Alice"),
        ]);
        corpus
    }

    fn positions(matches: &[&EntityMatch]) -> Vec<(usize, u32, usize)> {
        matches
            .iter()
            .map(|m| (m.document_index, m.page_number, m.char_start))
            .collect()
    }

    #[test]
    fn filter_returns_navigation_order() {
        let corpus = sample();
        assert_eq!(
            positions(&corpus.filter(&TypeFilter::All)),
            vec![(0, 1, 0), (0, 1, 30), (0, 2, 0), (1, 1, 14), (2, 1, 4)]
        );
    }

    #[test]
    fn filter_restricts_types() {
        let corpus = sample();
        let people = corpus.filter(&TypeFilter::only(["people"]));
        assert_eq!(people.len(), 3);
        assert!(people.iter().all(|m| m.entity_type == EntityType::people()));
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut corpus = CorpusMatchIndex::new();
        let alice = m(0, 1, EntityType::people(), 0, "Alice");
        let first = corpus.insert([alice.clone()]);
        let second = corpus.insert([alice]);
        assert_eq!(first.inserted, 1);
        assert_eq!(second.duplicates, 1);
        assert_eq!(corpus.filter(&TypeFilter::All).len(), 1);
        assert_eq!(corpus.count_by_type()[&EntityType::people()], 1);
    }

    #[test]
    fn same_span_different_type_is_distinct() {
        let mut corpus = CorpusMatchIndex::new();
        corpus.insert([
            m(0, 1, EntityType::people(), 0, "Paris"),
            m(0, 1, EntityType::places(), 0, "Paris"),
        ]);
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn invalid_matches_are_rejected() {
        let mut corpus = CorpusMatchIndex::new();
        let summary = corpus.insert([EntityMatch::new("", EntityType::people(), 0, 1, 0, 0)]);
        assert_eq!(summary.rejected, 1);
        assert!(corpus.is_empty());
    }

    #[test]
    fn remove_document_keeps_others_in_order() {
        let mut corpus = sample();
        let removed = corpus.remove_document(0);
        assert_eq!(removed, 3);
        let remaining = corpus.filter(&TypeFilter::All);
        assert!(remaining.iter().all(|m| m.document_index != 0));
        assert_eq!(positions(&remaining), vec![(1, 1, 14), (2, 1, 4)]);
    }

    #[test]
    fn remove_document_does_not_renumber() {
        let mut corpus = sample();
        corpus.register_document(2, "third.pdf");
        corpus.remove_document(1);
        assert_eq!(corpus.document_title(2), "third.pdf");
        assert!(corpus.iter().any(|m| m.document_index == 2));
    }

    #[test]
    fn unresolved_matches_are_excluded_from_resolved_view() {
        let mut corpus = CorpusMatchIndex::new();
        let geometry = crate::layout::Geometry {
            left: 0.0,
            top: 0.0,
            width: 10.0,
            height: 10.0,
        };
        corpus.insert([
            m(0, 1, EntityType::people(), 0, "Alice").with_geometry(Some(geometry)),
            m(0, 1, EntityType::places(), 14, "Paris"),
        ]);
        assert_eq!(corpus.filter(&TypeFilter::All).len(), 2);
        let resolved = corpus.resolved(&TypeFilter::All);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].text, "Alice");
    }

    #[test]
    fn group_dedups_by_sentence_and_title() {
        let mut corpus = CorpusMatchIndex::new();
        corpus.register_document(0, "a.pdf");
        corpus.register_document(1, "b.pdf");
        corpus.insert([
            m(0, 1, EntityType::places(), 14, "Paris").with_sentence("Alice went to Paris."),
            m(0, 2, EntityType::places(), 14, "PARIS").with_sentence("Alice went to Paris."),
            m(1, 1, EntityType::places(), 14, "Paris").with_sentence("Alice went to Paris."),
            m(1, 1, EntityType::places(), 40, "paris").with_sentence("Then Paris again."),
            m(1, 1, EntityType::people(), 0, "Alice"),
        ]);
        let groups = corpus.group_by_normalized_text(&TypeFilter::All);
        assert_eq!(groups.len(), 1);
        let mentions = &groups[&(EntityType::places(), "paris".to_string())];
        assert_eq!(
            mentions,
            &vec![
                Mention {
                    sentence: "Alice went to Paris.".into(),
                    document_title: "a.pdf".into(),
                },
                Mention {
                    sentence: "Alice went to Paris.".into(),
                    document_title: "b.pdf".into(),
                },
                Mention {
                    sentence: "Then Paris again.".into(),
                    document_title: "b.pdf".into(),
                },
            ]
        );
    }

    #[test]
    fn unregistered_titles_default_to_position() {
        let corpus = CorpusMatchIndex::new();
        assert_eq!(corpus.document_title(0), "Document 1");
    }

    #[test]
    fn relocate_replaces_geometry_for_new_scale() {
        let fragments = vec![
            TextFragment::new("Alice", Transform::translate(10.0, 100.0), 30.0, 10.0),
            TextFragment::new("went", Transform::translate(45.0, 100.0), 25.0, 10.0),
        ];
        let first = TextLayoutIndex::build(fragments.clone());
        let mut corpus = CorpusMatchIndex::new();
        let alice = m(0, 1, EntityType::people(), 0, "Alice");
        corpus.insert([alice.clone().with_geometry(first.resolve(0, 5))]);

        let zoomed = TextLayoutIndex::build_scaled(fragments, 2.0);
        let summary = corpus.relocate_page(0, 1, &zoomed);
        assert_eq!(summary, RelocateSummary { resolved: 1, unresolved: 0 });
        let stored = corpus.get(&alice.key()).unwrap();
        assert_eq!(stored.geometry.unwrap().left, 20.0);
    }

    #[test]
    fn clear_empties_everything() {
        let mut corpus = sample();
        corpus.register_document(0, "a.pdf");
        corpus.clear();
        assert!(corpus.is_empty());
        assert_eq!(corpus.documents().count(), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn match_set() -> impl Strategy<Value = Vec<EntityMatch>> {
        prop::collection::vec(
            (0usize..3, 1u32..4, 0usize..4, 0usize..200, "[A-Za-z]{1,10}"),
            0..40,
        )
        .prop_map(|parts| {
            parts
                .into_iter()
                .map(|(doc, page, ty, start, text)| {
                    let len = text.chars().count();
                    let entity_type = EntityType::standard()[ty].clone();
                    EntityMatch::new(text, entity_type, doc, page, start, len)
                })
                .collect()
        })
    }

    proptest! {
        /// Property: inserting the same matches again changes nothing
        #[test]
        fn insert_is_idempotent(matches in match_set()) {
            let mut corpus = CorpusMatchIndex::new();
            let first = corpus.insert(matches.clone());
            let before: Vec<EntityMatch> = corpus.iter().cloned().collect();

            let again = corpus.insert(matches);
            prop_assert_eq!(again.inserted, 0);
            prop_assert_eq!(again.duplicates, first.inserted + first.duplicates);
            let after: Vec<EntityMatch> = corpus.iter().cloned().collect();
            prop_assert_eq!(before, after);
        }

        /// Property: iteration follows key order
        #[test]
        fn iteration_is_navigation_order(matches in match_set()) {
            let mut corpus = CorpusMatchIndex::new();
            corpus.insert(matches);
            let keys: Vec<MatchKey> = corpus.iter().map(EntityMatch::key).collect();
            prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }

        /// Property: removing a document keeps the others in their order
        #[test]
        fn removal_preserves_order(matches in match_set(), removed in 0usize..3) {
            let mut corpus = CorpusMatchIndex::new();
            corpus.insert(matches);
            let expected: Vec<MatchKey> = corpus
                .iter()
                .filter(|m| m.document_index != removed)
                .map(EntityMatch::key)
                .collect();

            corpus.remove_document(removed);
            let remaining: Vec<MatchKey> = corpus.iter().map(EntityMatch::key).collect();
            prop_assert_eq!(remaining, expected);
            prop_assert!(corpus.iter().all(|m| m.document_index != removed));
        }
    }
}
