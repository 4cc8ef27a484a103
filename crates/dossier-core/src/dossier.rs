//! Cross-document summary: every entity with the sentences it appears in.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::corpus::{CorpusMatchIndex, Mention};
use crate::entity::{EntityType, TypeFilter};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DossierEntry {
    /// Text as first seen in navigation order.
    pub text: String,
    pub normalized: String,
    pub mentions: Vec<Mention>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DossierSection {
    pub entity_type: EntityType,
    pub entries: Vec<DossierEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dossier {
    pub sections: Vec<DossierSection>,
}

impl Dossier {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }
}

impl CorpusMatchIndex {
    /// Build the dossier for the enabled types.
    ///
    /// Sections follow type order. Entries are sorted by mention count,
    /// most mentioned first, then by normalised text.
    pub fn dossier(&self, enabled: &TypeFilter) -> Dossier {
        let mut display: BTreeMap<(EntityType, String), String> = BTreeMap::new();
        for m in self.filter(enabled) {
            display
                .entry((m.entity_type.clone(), m.text.to_lowercase()))
                .or_insert_with(|| m.text.clone());
        }

        let mut sections: BTreeMap<EntityType, Vec<DossierEntry>> = BTreeMap::new();
        for ((entity_type, normalized), mentions) in self.group_by_normalized_text(enabled) {
            let text = display
                .get(&(entity_type.clone(), normalized.clone()))
                .cloned()
                .unwrap_or_else(|| normalized.clone());
            sections.entry(entity_type).or_default().push(DossierEntry {
                text,
                normalized,
                mentions,
            });
        }

        let sections = sections
            .into_iter()
            .map(|(entity_type, mut entries)| {
                entries.sort_by(|a, b| {
                    b.mentions
                        .len()
                        .cmp(&a.mentions.len())
                        .then_with(|| a.normalized.cmp(&b.normalized))
                });
                DossierSection {
                    entity_type,
                    entries,
                }
            })
            .collect();
        Dossier { sections }
    }
}
