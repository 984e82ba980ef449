use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a checklist definition (the template shared by all
/// evaluations of a subject population).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionId(pub u64);

/// Identifier of a section row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u64);

/// Identifier of an item row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node in a definition's section tree. Root sections carry no parent;
/// `position` is unique and contiguous among siblings sharing the same scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub definition: DefinitionId,
    pub name: String,
    pub parent: Option<SectionId>,
    pub position: u32,
}

/// Section draft before the store assigns an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    pub definition: DefinitionId,
    pub name: String,
    pub parent: Option<SectionId>,
    pub position: u32,
}

/// A typed leaf entry inside a section. `item_type` is a registry tag such as
/// `text_input`; `position` follows the same contiguity rules as sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub section: SectionId,
    pub name: String,
    pub description: Option<String>,
    pub is_required: bool,
    pub item_type: String,
    pub position: u32,
}

/// Item draft before the store assigns an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub section: SectionId,
    pub name: String,
    pub description: Option<String>,
    pub is_required: bool,
    pub item_type: String,
    pub position: u32,
}
