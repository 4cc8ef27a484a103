use regex::{Regex, RegexBuilder};

use super::{RawEntity, find_char_spans};
use crate::entity::EntityType;

/// User-supplied custom term search.
///
/// Custom terms are not a trained entity class, so they are always matched
/// here rather than by whichever backend is active. Matching is
/// case-insensitive unless [`with_case_sensitive`](Self::with_case_sensitive)
/// says otherwise. In literal mode the term is escaped; in regex mode the
/// term is compiled as-is and falls back to literal matching if it does not
/// compile.
#[derive(Debug, Clone)]
pub struct CustomTermMatcher {
    term: String,
    regex: Regex,
    case_sensitive: bool,
}

impl CustomTermMatcher {
    /// Literal term. Returns `None` for a blank term.
    pub fn literal(term: &str) -> Option<Self> {
        if term.trim().is_empty() {
            return None;
        }
        let regex = build(&regex::escape(term), false)?;
        Some(Self {
            term: term.to_string(),
            regex,
            case_sensitive: false,
        })
    }

    /// Regular-expression term. Returns `None` for a blank term.
    pub fn pattern(expr: &str) -> Option<Self> {
        if expr.trim().is_empty() {
            return None;
        }
        match build(expr, false) {
            Some(regex) => Some(Self {
                term: expr.to_string(),
                regex,
                case_sensitive: false,
            }),
            None => {
                tracing::warn!(term = expr, "custom term is not a valid regex, matching literally");
                Self::literal(expr)
            }
        }
    }

    /// Recompile with or without exact-case matching.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        if case_sensitive != self.case_sensitive
            && let Some(regex) = build(self.regex.as_str(), case_sensitive)
        {
            self.regex = regex;
            self.case_sensitive = case_sensitive;
        }
        self
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// All non-overlapping hits, tagged [`EntityType::custom`].
    pub fn find(&self, page_text: &str) -> Vec<RawEntity> {
        find_char_spans(&self.regex, page_text)
            .into_iter()
            .map(|span| RawEntity::new(span.text, EntityType::custom(), span.start, span.len))
            .collect()
    }
}

fn build(expr: &str, case_sensitive: bool) -> Option<Regex> {
    RegexBuilder::new(expr)
        .case_insensitive(!case_sensitive)
        .build()
        .ok()
}
