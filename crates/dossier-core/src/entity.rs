use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Open entity category tag.
///
/// The well-known categories have constructors, but any backend-specific or
/// user-defined tag is accepted. Tags are normalised to trimmed lowercase so
/// `"People"` and `"people"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    pub fn new(tag: &str) -> Self {
        Self(tag.trim().to_lowercase())
    }

    pub fn people() -> Self {
        Self("people".into())
    }

    pub fn places() -> Self {
        Self("places".into())
    }

    pub fn organizations() -> Self {
        Self("organizations".into())
    }

    pub fn dates() -> Self {
        Self("dates".into())
    }

    pub fn custom() -> Self {
        Self("custom".into())
    }

    // Categories only the tagging service emits.

    pub fn money() -> Self {
        Self("money".into())
    }

    pub fn percentages() -> Self {
        Self("percentages".into())
    }

    pub fn values() -> Self {
        Self("values".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_custom(&self) -> bool {
        self.0 == "custom"
    }

    /// The five categories the search UI offers by default.
    pub fn standard() -> [EntityType; 5] {
        [
            Self::people(),
            Self::places(),
            Self::organizations(),
            Self::dates(),
            Self::custom(),
        ]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<EntityType> for String {
    fn from(t: EntityType) -> Self {
        t.0
    }
}

/// Which entity types a query or view is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(BTreeSet<EntityType>),
}

impl TypeFilter {
    pub fn only<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityType>,
    {
        Self::Only(types.into_iter().map(Into::into).collect())
    }

    /// Parse a comma-separated list. An empty list or `"all"` means every type.
    pub fn parse(list: &str) -> Self {
        let types: BTreeSet<EntityType> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EntityType::new)
            .collect();
        if types.is_empty() || types.iter().any(|t| t.as_str() == "all") {
            Self::All
        } else {
            Self::Only(types)
        }
    }

    pub fn contains(&self, entity_type: &EntityType) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(entity_type),
        }
    }

    /// True when no type can pass.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(set) if set.is_empty())
    }
}
