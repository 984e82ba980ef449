//! The checklist content tree: sections, items, and their strict ordering.

pub mod domain;
pub mod ordering;
pub mod repository;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{DefinitionId, Item, ItemId, NewItem, NewSection, Section, SectionId};
pub use ordering::{MoveDirection, OrderingError};
pub use repository::{ContentRepository, RemovalBatch};
pub use service::{ContentError, ContentTreeService};
