use super::domain::{Item, ItemId, NewItem, NewSection, Section, SectionId};
use crate::checklist::DefinitionId;
use crate::store::RepositoryError;

/// Everything one structural delete must remove and rewrite as a unit: the
/// cascaded rows (responses and configs for the listed items go with them)
/// plus the renumbering of the surviving siblings. A reader must never
/// observe a partially applied batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalBatch {
    pub sections: Vec<SectionId>,
    pub items: Vec<ItemId>,
    pub section_positions: Vec<(SectionId, u32)>,
    pub item_positions: Vec<(ItemId, u32)>,
}

/// Storage abstraction for section and item rows. Listing methods return rows
/// ordered by position. `swap_*` and `apply_removal` are atomic: they either
/// apply fully or leave state untouched.
pub trait ContentRepository: Send + Sync {
    fn insert_section(&self, draft: NewSection) -> Result<Section, RepositoryError>;
    fn fetch_section(&self, id: SectionId) -> Result<Option<Section>, RepositoryError>;
    fn update_section(&self, section: &Section) -> Result<(), RepositoryError>;
    fn root_sections(&self, definition: DefinitionId) -> Result<Vec<Section>, RepositoryError>;
    fn child_sections(&self, parent: SectionId) -> Result<Vec<Section>, RepositoryError>;

    fn insert_item(&self, draft: NewItem) -> Result<Item, RepositoryError>;
    fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;
    fn update_item(&self, item: &Item) -> Result<(), RepositoryError>;
    fn section_items(&self, section: SectionId) -> Result<Vec<Item>, RepositoryError>;
    /// All `is_required` items under the definition's tree.
    fn required_items(&self, definition: DefinitionId) -> Result<Vec<Item>, RepositoryError>;

    /// Exchange the positions of two sibling sections in one unit.
    fn swap_section_positions(&self, a: SectionId, b: SectionId) -> Result<(), RepositoryError>;
    /// Exchange the positions of two sibling items in one unit.
    fn swap_item_positions(&self, a: ItemId, b: ItemId) -> Result<(), RepositoryError>;
    /// Apply a cascade delete plus sibling renumbering in one unit.
    fn apply_removal(&self, batch: RemovalBatch) -> Result<(), RepositoryError>;
}
