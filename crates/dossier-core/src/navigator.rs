//! Cursor over the filtered, ordered match sequence.
//!
//! The navigator keeps a snapshot of the keys visible under the active
//! filter. The cursor identifies a match by position in that snapshot, and
//! every recomputation repoints it by [`MatchKey`] so filter changes and
//! document removal never leave it on the wrong match.

use crate::corpus::CorpusMatchIndex;
use crate::entity::TypeFilter;
use crate::matches::{EntityMatch, MatchKey};

#[derive(Debug, Clone, Default)]
pub struct MatchNavigator {
    active_filter: TypeFilter,
    view: Vec<MatchKey>,
    cursor: Option<usize>,
}

impl MatchNavigator {
    /// A navigator over every type, positioned on the first match.
    pub fn new(corpus: &CorpusMatchIndex) -> Self {
        let mut nav = Self::default();
        nav.refresh(corpus);
        nav
    }

    pub fn active_filter(&self) -> &TypeFilter {
        &self.active_filter
    }

    /// Switch filters. Stays on the selected match if the new filter still
    /// shows it, otherwise moves to the first visible match.
    pub fn set_filter(&mut self, filter: TypeFilter, corpus: &CorpusMatchIndex) {
        self.active_filter = filter;
        self.refresh(corpus);
    }

    /// Recompute the view after the corpus changed.
    pub fn refresh(&mut self, corpus: &CorpusMatchIndex) {
        let selected = self.current_key().cloned();
        self.view = corpus
            .filter(&self.active_filter)
            .into_iter()
            .map(EntityMatch::key)
            .collect();
        self.cursor = selected
            .and_then(|key| self.view.iter().position(|k| *k == key))
            .or(if self.view.is_empty() { None } else { Some(0) });
    }

    /// Advance with wraparound. Returns the new position, or `None` when the
    /// view is empty.
    pub fn next(&mut self) -> Option<usize> {
        let len = self.view.len();
        if len == 0 {
            self.cursor = None;
            return None;
        }
        let pos = self.cursor.map_or(0, |c| (c + 1) % len);
        self.cursor = Some(pos);
        self.cursor
    }

    /// Step back with wraparound.
    pub fn previous(&mut self) -> Option<usize> {
        let len = self.view.len();
        if len == 0 {
            self.cursor = None;
            return None;
        }
        let pos = self.cursor.map_or(len - 1, |c| (c + len - 1) % len);
        self.cursor = Some(pos);
        self.cursor
    }

    pub fn current_key(&self) -> Option<&MatchKey> {
        self.cursor.and_then(|c| self.view.get(c))
    }

    pub fn current<'c>(&self, corpus: &'c CorpusMatchIndex) -> Option<&'c EntityMatch> {
        self.current_key().and_then(|key| corpus.get(key))
    }

    /// Cursor position and view length, e.g. for a "3 / 17" label.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.cursor.map(|c| (c, self.view.len()))
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::entity::EntityType;
    use proptest::prelude::*;

    fn corpus() -> impl Strategy<Value = CorpusMatchIndex> {
        prop::collection::vec((0usize..3, 1u32..4, any::<bool>(), 0usize..100), 0..30).prop_map(
            |parts| {
                let mut corpus = CorpusMatchIndex::new();
                corpus.insert(parts.into_iter().map(|(doc, page, person, start)| {
                    let (text, entity_type) = if person {
                        ("Alice", EntityType::people())
                    } else {
                        ("Paris", EntityType::places())
                    };
                    EntityMatch::new(text, entity_type, doc, page, start, 5)
                }));
                corpus
            },
        )
    }

    proptest! {
        /// Property: `len` steps forward or back return to the starting match
        #[test]
        fn full_lap_returns_to_start(corpus in corpus(), steps in 0usize..10) {
            let mut nav = MatchNavigator::new(&corpus);
            prop_assume!(!nav.is_empty());
            for _ in 0..steps {
                nav.next();
            }
            let start = nav.current_key().cloned();
            for _ in 0..nav.len() {
                nav.next();
            }
            prop_assert_eq!(nav.current_key().cloned(), start.clone());
            for _ in 0..nav.len() {
                nav.previous();
            }
            prop_assert_eq!(nav.current_key().cloned(), start);
        }

        /// Property: next visits the view in key order and previous undoes it
        #[test]
        fn next_walks_key_order(corpus in corpus(), people_only in any::<bool>()) {
            let mut nav = MatchNavigator::new(&corpus);
            if people_only {
                nav.set_filter(TypeFilter::only(["people"]), &corpus);
            }
            let expected: Vec<MatchKey> = corpus
                .filter(nav.active_filter())
                .into_iter()
                .map(EntityMatch::key)
                .collect();

            let mut seen = Vec::new();
            for _ in 0..nav.len() {
                seen.extend(nav.current_key().cloned());
                let here = nav.current_key().cloned();
                nav.next();
                nav.previous();
                prop_assert_eq!(nav.current_key().cloned(), here);
                nav.next();
            }
            prop_assert_eq!(seen, expected);
        }

        /// Property: an empty view never yields a position
        #[test]
        fn empty_view_has_no_cursor(corpus in corpus()) {
            let mut nav = MatchNavigator::new(&corpus);
            nav.set_filter(TypeFilter::only(["dates"]), &corpus);
            prop_assert_eq!(nav.next(), None);
            prop_assert_eq!(nav.previous(), None);
            prop_assert!(nav.current(&corpus).is_none());
        }
    }
}
