use std::sync::Arc;

use crate::checklist::{ContentTreeService, DefinitionId, Item, Section};
use crate::store::InMemoryStore;
use crate::types::{ItemTypeRegistry, TEXT_INPUT};

pub(super) const DEFINITION: DefinitionId = DefinitionId(7);

pub(super) fn service() -> (Arc<InMemoryStore>, ContentTreeService<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let registry = Arc::new(ItemTypeRegistry::with_builtins());
    let service = ContentTreeService::new(store.clone(), registry);
    (store, service)
}

pub(super) fn root_section(service: &ContentTreeService<InMemoryStore>, name: &str) -> Section {
    service
        .add_section(DEFINITION, name, None)
        .expect("can add root section")
}

pub(super) fn text_items(
    service: &ContentTreeService<InMemoryStore>,
    section: &Section,
    names: &[&str],
) -> Vec<Item> {
    names
        .iter()
        .map(|name| {
            service
                .add_item(section.id, name, None, true, TEXT_INPUT)
                .expect("can add item")
        })
        .collect()
}

pub(super) fn positions(items: &[Item]) -> Vec<u32> {
    items.iter().map(|item| item.position).collect()
}
