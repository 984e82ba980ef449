use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::domain::{DefinitionId, Item, ItemId, NewItem, NewSection, Section, SectionId};
use super::ordering::{self, MoveDirection, OrderingError};
use super::repository::{ContentRepository, RemovalBatch};
use crate::store::RepositoryError;
use crate::types::{ConfigRepository, ConfigValidationError, ItemTypeRegistry};

/// Failures raised by structural operations on the content tree.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("section {0} not found")]
    SectionNotFound(SectionId),
    #[error("item {0} not found")]
    ItemNotFound(ItemId),
    #[error("unknown item type '{0}'")]
    UnknownItemType(String),
    #[error("ordering invariant violated in {scope}")]
    Integrity {
        scope: String,
        #[source]
        source: OrderingError,
    },
    #[error(transparent)]
    Config(#[from] ConfigValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Structural CRUD over sections and items, with cascading deletion and the
/// position guarantees delegated to [`ordering`].
pub struct ContentTreeService<S> {
    store: Arc<S>,
    registry: Arc<ItemTypeRegistry>,
}

impl<S> ContentTreeService<S>
where
    S: ContentRepository + ConfigRepository,
{
    pub fn new(store: Arc<S>, registry: Arc<ItemTypeRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn section(&self, id: SectionId) -> Result<Section, ContentError> {
        self.store
            .fetch_section(id)?
            .ok_or(ContentError::SectionNotFound(id))
    }

    pub fn item(&self, id: ItemId) -> Result<Item, ContentError> {
        self.store
            .fetch_item(id)?
            .ok_or(ContentError::ItemNotFound(id))
    }

    /// Append a section at the end of its sibling scope. A parent, when
    /// given, must exist and belong to the same definition.
    pub fn add_section(
        &self,
        definition: DefinitionId,
        name: &str,
        parent: Option<SectionId>,
    ) -> Result<Section, ContentError> {
        if let Some(parent_id) = parent {
            let parent_section = self.section(parent_id)?;
            if parent_section.definition != definition {
                return Err(ContentError::SectionNotFound(parent_id));
            }
        }

        let siblings = self.section_scope(definition, parent)?;
        let position = ordering::append_position(siblings.iter().map(|s| s.position));
        let section = self.store.insert_section(NewSection {
            definition,
            name: name.to_string(),
            parent,
            position,
        })?;
        debug!(section = %section.id, definition = %definition, position, "section added");
        Ok(section)
    }

    pub fn rename_section(&self, id: SectionId, name: &str) -> Result<Section, ContentError> {
        let mut section = self.section(id)?;
        section.name = name.to_string();
        self.store.update_section(&section)?;
        Ok(section)
    }

    /// Move a section one step within its siblings. Already at the boundary
    /// is a silent no-op; a missing adjacent sibling is an integrity failure.
    pub fn move_section(&self, id: SectionId, direction: MoveDirection) -> Result<(), ContentError> {
        let section = self.section(id)?;
        let siblings: Vec<(SectionId, u32)> = self
            .section_scope(section.definition, section.parent)?
            .into_iter()
            .map(|s| (s.id, s.position))
            .collect();

        let plan = ordering::plan_swap(section.position, direction, &siblings).map_err(|source| {
            ContentError::Integrity {
                scope: section_scope_label(section.definition, section.parent),
                source,
            }
        })?;

        match plan {
            Some(neighbour) => {
                self.store.swap_section_positions(section.id, neighbour)?;
                debug!(section = %id, ?direction, "section moved");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Delete a section together with its whole subtree: descendant sections,
    /// their items, and those items' responses and type configs, then
    /// renumber the surviving siblings. Applied as one atomic batch.
    pub fn delete_section(&self, id: SectionId) -> Result<(), ContentError> {
        let target = self.section(id)?;

        let mut batch = RemovalBatch::default();
        let mut worklist = vec![target.clone()];
        while let Some(section) = worklist.pop() {
            for item in self.store.section_items(section.id)? {
                batch.items.push(item.id);
            }
            worklist.extend(self.store.child_sections(section.id)?);
            batch.sections.push(section.id);
        }

        let survivors = self
            .section_scope(target.definition, target.parent)?
            .into_iter()
            .filter(|s| s.id != target.id)
            .map(|s| s.id);
        batch.section_positions = ordering::renumber(survivors);

        let removed_sections = batch.sections.len();
        let removed_items = batch.items.len();
        self.store.apply_removal(batch)?;
        info!(
            section = %id,
            removed_sections,
            removed_items,
            "section deleted with child data"
        );
        Ok(())
    }

    /// Append an item at the end of its section. The type tag must be known
    /// to the registry.
    pub fn add_item(
        &self,
        section: SectionId,
        name: &str,
        description: Option<&str>,
        is_required: bool,
        item_type: &str,
    ) -> Result<Item, ContentError> {
        if !self.registry.contains(item_type) {
            return Err(ContentError::UnknownItemType(item_type.to_string()));
        }
        self.section(section)?;

        let siblings = self.store.section_items(section)?;
        let position = ordering::append_position(siblings.iter().map(|i| i.position));
        let item = self.store.insert_item(NewItem {
            section,
            name: name.to_string(),
            description: description.map(str::to_string),
            is_required,
            item_type: item_type.to_string(),
            position,
        })?;
        debug!(item = %item.id, section = %section, position, "item added");
        Ok(item)
    }

    pub fn rename_item(&self, id: ItemId, name: &str) -> Result<Item, ContentError> {
        let mut item = self.item(id)?;
        item.name = name.to_string();
        self.store.update_item(&item)?;
        Ok(item)
    }

    pub fn set_item_description(
        &self,
        id: ItemId,
        description: Option<&str>,
    ) -> Result<Item, ContentError> {
        let mut item = self.item(id)?;
        item.description = description.map(str::to_string);
        self.store.update_item(&item)?;
        Ok(item)
    }

    pub fn set_item_required(&self, id: ItemId, is_required: bool) -> Result<Item, ContentError> {
        let mut item = self.item(id)?;
        item.is_required = is_required;
        self.store.update_item(&item)?;
        Ok(item)
    }

    /// Move an item one step within its section. Same boundary and integrity
    /// rules as [`ContentTreeService::move_section`].
    pub fn move_item(&self, id: ItemId, direction: MoveDirection) -> Result<(), ContentError> {
        let item = self.item(id)?;
        let siblings: Vec<(ItemId, u32)> = self
            .store
            .section_items(item.section)?
            .into_iter()
            .map(|i| (i.id, i.position))
            .collect();

        let plan = ordering::plan_swap(item.position, direction, &siblings).map_err(|source| {
            ContentError::Integrity {
                scope: format!("items of section {}", item.section),
                source,
            }
        })?;

        match plan {
            Some(neighbour) => {
                self.store.swap_item_positions(item.id, neighbour)?;
                debug!(item = %id, ?direction, "item moved");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Delete an item, its responses, and its type config, then renumber the
    /// remaining items of its section. Applied as one atomic batch.
    pub fn delete_item(&self, id: ItemId) -> Result<(), ContentError> {
        let item = self.item(id)?;
        let survivors = self
            .store
            .section_items(item.section)?
            .into_iter()
            .filter(|i| i.id != item.id)
            .map(|i| i.id);

        let batch = RemovalBatch {
            items: vec![item.id],
            item_positions: ordering::renumber(survivors),
            ..RemovalBatch::default()
        };
        self.store.apply_removal(batch)?;
        info!(item = %id, section = %item.section, "item deleted");
        Ok(())
    }

    /// Ordered top-level sections of a definition.
    pub fn list_root_sections(&self, definition: DefinitionId) -> Result<Vec<Section>, ContentError> {
        Ok(self.store.root_sections(definition)?)
    }

    /// Ordered subsections of a section.
    pub fn list_subsections(&self, id: SectionId) -> Result<Vec<Section>, ContentError> {
        self.section(id)?;
        Ok(self.store.child_sections(id)?)
    }

    /// Ordered items of a section.
    pub fn list_items(&self, id: SectionId) -> Result<Vec<Item>, ContentError> {
        self.section(id)?;
        Ok(self.store.section_items(id)?)
    }

    /// Validate a raw config payload against the item's type schema and
    /// replace the stored config wholesale. No partial merge: prior keys are
    /// dropped even when the validated set is empty.
    pub fn update_item_config(
        &self,
        id: ItemId,
        raw: &Map<String, Value>,
    ) -> Result<BTreeMap<String, String>, ContentError> {
        let item = self.item(id)?;
        let behavior = self
            .registry
            .get(&item.item_type)
            .ok_or_else(|| ContentError::UnknownItemType(item.item_type.clone()))?;
        let validated = behavior.validate_config(raw)?;
        self.store.replace_config(item.id, validated.clone())?;
        debug!(item = %id, keys = validated.len(), "item config replaced");
        Ok(validated)
    }

    /// The stored config map for an item.
    pub fn item_config(&self, id: ItemId) -> Result<BTreeMap<String, String>, ContentError> {
        self.item(id)?;
        Ok(self.store.fetch_config(id)?)
    }

    fn section_scope(
        &self,
        definition: DefinitionId,
        parent: Option<SectionId>,
    ) -> Result<Vec<Section>, ContentError> {
        let siblings = match parent {
            Some(parent_id) => self.store.child_sections(parent_id)?,
            None => self.store.root_sections(definition)?,
        };
        Ok(siblings)
    }
}

fn section_scope_label(definition: DefinitionId, parent: Option<SectionId>) -> String {
    match parent {
        Some(parent_id) => format!("subsections of section {parent_id}"),
        None => format!("top-level sections of definition {definition}"),
    }
}
