//! Cross-document analysis: entities that link documents, and a dated
//! timeline of the sentences the corpus mentions dates in.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::corpus::CorpusMatchIndex;
use crate::entity::{EntityType, TypeFilter};

/// Entities shorter than this (in chars) never connect documents.
pub const MIN_SHARED_CHARS: usize = 4;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])\b").unwrap());

static MONTH_DAY_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+([12]\d|3[01]|0?[1-9])(?:st|nd|rd|th)?,?\s+((?:19|20)\d{2})\b")
        .unwrap()
});

static DAY_MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([12]\d|3[01]|0?[1-9])(?:st|nd|rd|th)?\s+(?:of\s+)?(january|february|march|april|may|june|july|august|september|october|november|december),?\s+((?:19|20)\d{2})\b")
        .unwrap()
});

static MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december),?\s+((?:19|20)\d{2})\b")
        .unwrap()
});

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());

/// An entity found in more than one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedEntity {
    pub entity_type: EntityType,
    /// Text as first seen in navigation order.
    pub text: String,
    /// Document indices, ascending.
    pub documents: Vec<usize>,
}

/// Two documents linked by at least one shared entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentConnection {
    /// Lower document index of the pair.
    pub first: usize,
    pub second: usize,
    /// Texts of the entities both documents mention.
    pub shared: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Connections {
    pub shared: Vec<SharedEntity>,
    pub pairs: Vec<DocumentConnection>,
}

impl Connections {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A calendar date with optional month and day. Orders chronologically,
/// with a bare year before any month of that year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventDate {
    pub year: u16,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl EventDate {
    /// The most specific date written in `text`, if any.
    pub fn find(text: &str) -> Option<Self> {
        if let Some(c) = ISO_DATE_RE.captures(text) {
            return Some(Self {
                year: c[1].parse().ok()?,
                month: c[2].parse().ok(),
                day: c[3].parse().ok(),
            });
        }
        if let Some(c) = MONTH_DAY_YEAR_RE.captures(text) {
            return Some(Self {
                year: c[3].parse().ok()?,
                month: month_number(&c[1]),
                day: c[2].parse().ok(),
            });
        }
        if let Some(c) = DAY_MONTH_YEAR_RE.captures(text) {
            return Some(Self {
                year: c[3].parse().ok()?,
                month: month_number(&c[2]),
                day: c[1].parse().ok(),
            });
        }
        if let Some(c) = MONTH_YEAR_RE.captures(text) {
            return Some(Self {
                year: c[2].parse().ok()?,
                month: month_number(&c[1]),
                day: None,
            });
        }
        let c = YEAR_RE.captures(text)?;
        Some(Self {
            year: c[1].parse().ok()?,
            month: None,
            day: None,
        })
    }
}

impl fmt::Display for EventDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
            if let Some(day) = self.day {
                write!(f, "-{:02}", day)?;
            }
        }
        Ok(())
    }
}

fn month_number(name: &str) -> Option<u8> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u8 + 1)
}

/// One dated sentence of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChronologyEntry {
    pub date: EventDate,
    pub sentence: String,
    pub document_index: usize,
    pub document_title: String,
    pub page_number: u32,
}

impl CorpusMatchIndex {
    /// Entities of the enabled types that appear in two or more documents,
    /// and the document pairs they connect.
    ///
    /// Entities compare by type and lowercase text. Pairs are ordered by
    /// document index.
    pub fn connections(&self, enabled: &TypeFilter) -> Connections {
        let mut groups: BTreeMap<(EntityType, String), (String, BTreeSet<usize>)> = BTreeMap::new();
        for m in self.filter(enabled) {
            if m.text.chars().count() < MIN_SHARED_CHARS {
                continue;
            }
            groups
                .entry((m.entity_type.clone(), m.text.to_lowercase()))
                .or_insert_with(|| (m.text.clone(), BTreeSet::new()))
                .1
                .insert(m.document_index);
        }

        let mut shared = Vec::new();
        let mut pairs: BTreeMap<(usize, usize), Vec<String>> = BTreeMap::new();
        for ((entity_type, _), (text, documents)) in groups {
            if documents.len() < 2 {
                continue;
            }
            let documents: Vec<usize> = documents.into_iter().collect();
            for (i, first) in documents.iter().enumerate() {
                for second in &documents[i + 1..] {
                    pairs.entry((*first, *second)).or_default().push(text.clone());
                }
            }
            shared.push(SharedEntity {
                entity_type,
                text,
                documents,
            });
        }

        tracing::debug!(shared = shared.len(), pairs = pairs.len(), "computed document connections");
        Connections {
            shared,
            pairs: pairs
                .into_iter()
                .map(|((first, second), shared)| DocumentConnection {
                    first,
                    second,
                    shared,
                })
                .collect(),
        }
    }

    /// Sentences holding a date match, ordered by the date they mention.
    ///
    /// Each sentence appears once per document. Sentences whose dates carry
    /// no year are left out. Ties keep navigation order.
    pub fn chronology(&self) -> Vec<ChronologyEntry> {
        let dates = TypeFilter::only([EntityType::dates()]);
        let mut seen: BTreeSet<(usize, &str)> = BTreeSet::new();
        let mut entries = Vec::new();

        for m in self.filter(&dates) {
            let Some(sentence) = m.sentence.as_deref() else {
                continue;
            };
            if !seen.insert((m.document_index, sentence)) {
                continue;
            }
            let Some(date) = EventDate::find(sentence) else {
                continue;
            };
            entries.push(ChronologyEntry {
                date,
                sentence: sentence.to_string(),
                document_index: m.document_index,
                document_title: self.document_title(m.document_index),
                page_number: m.page_number,
            });
        }

        // Stable: equal dates stay in navigation order.
        entries.sort_by_key(|e| e.date);
        tracing::debug!(events = entries.len(), "built chronology");
        entries
    }
}
