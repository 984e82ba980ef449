//! In-memory storage backing the repository traits.
//!
//! Every trait call acquires the single state lock once, so the operations
//! the domain requires to be atomic — position swaps, removal batches, and
//! supersede — are each all-or-nothing with respect to other callers.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::checklist::{
    ContentRepository, DefinitionId, Item, ItemId, NewItem, NewSection, RemovalBatch, Section,
    SectionId,
};
use crate::evaluation::{
    CompletionGate, CompletionProgress, Evaluation, EvaluationId, EvaluationRepository,
    NewEvaluation, SubjectId,
};
use crate::responses::{Response, ResponseId, ResponseRepository};
use crate::types::{ConfigRepository, FileStorage, FileStorageError};

/// Storage failures, distinct from the business errors raised above it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Everything the full service stack needs from one storage backend.
pub trait WorkbookStore:
    ContentRepository + ConfigRepository + ResponseRepository + EvaluationRepository
{
}

impl<T> WorkbookStore for T where
    T: ContentRepository + ConfigRepository + ResponseRepository + EvaluationRepository
{
}

#[derive(Debug, Default)]
struct StoreState {
    sections: BTreeMap<SectionId, Section>,
    items: BTreeMap<ItemId, Item>,
    configs: BTreeMap<ItemId, BTreeMap<String, String>>,
    responses: BTreeMap<ResponseId, Response>,
    evaluations: BTreeMap<EvaluationId, Evaluation>,
    next_section: u64,
    next_item: u64,
    next_response: u64,
    next_evaluation: u64,
}

/// Mutex-guarded store used by the API service and the test suites.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("store mutex poisoned")
    }
}

fn ordered_sections<'a>(
    state: impl Iterator<Item = &'a Section>,
    mut keep: impl FnMut(&Section) -> bool,
) -> Vec<Section> {
    let mut rows: Vec<Section> = state.filter(|s| keep(s)).cloned().collect();
    rows.sort_by_key(|s| s.position);
    rows
}

impl ContentRepository for InMemoryStore {
    fn insert_section(&self, draft: NewSection) -> Result<Section, RepositoryError> {
        let mut state = self.lock();
        state.next_section += 1;
        let section = Section {
            id: SectionId(state.next_section),
            definition: draft.definition,
            name: draft.name,
            parent: draft.parent,
            position: draft.position,
        };
        state.sections.insert(section.id, section.clone());
        Ok(section)
    }

    fn fetch_section(&self, id: SectionId) -> Result<Option<Section>, RepositoryError> {
        Ok(self.lock().sections.get(&id).cloned())
    }

    fn update_section(&self, section: &Section) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if !state.sections.contains_key(&section.id) {
            return Err(RepositoryError::NotFound);
        }
        state.sections.insert(section.id, section.clone());
        Ok(())
    }

    fn root_sections(&self, definition: DefinitionId) -> Result<Vec<Section>, RepositoryError> {
        let state = self.lock();
        Ok(ordered_sections(state.sections.values(), |s| {
            s.definition == definition && s.parent.is_none()
        }))
    }

    fn child_sections(&self, parent: SectionId) -> Result<Vec<Section>, RepositoryError> {
        let state = self.lock();
        Ok(ordered_sections(state.sections.values(), |s| {
            s.parent == Some(parent)
        }))
    }

    fn insert_item(&self, draft: NewItem) -> Result<Item, RepositoryError> {
        let mut state = self.lock();
        state.next_item += 1;
        let item = Item {
            id: ItemId(state.next_item),
            section: draft.section,
            name: draft.name,
            description: draft.description,
            is_required: draft.is_required,
            item_type: draft.item_type,
            position: draft.position,
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        Ok(self.lock().items.get(&id).cloned())
    }

    fn update_item(&self, item: &Item) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if !state.items.contains_key(&item.id) {
            return Err(RepositoryError::NotFound);
        }
        state.items.insert(item.id, item.clone());
        Ok(())
    }

    fn section_items(&self, section: SectionId) -> Result<Vec<Item>, RepositoryError> {
        let state = self.lock();
        let mut rows: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.section == section)
            .cloned()
            .collect();
        rows.sort_by_key(|item| item.position);
        Ok(rows)
    }

    fn required_items(&self, definition: DefinitionId) -> Result<Vec<Item>, RepositoryError> {
        let state = self.lock();
        let mut rows: Vec<Item> = state
            .items
            .values()
            .filter(|item| {
                item.is_required
                    && state
                        .sections
                        .get(&item.section)
                        .is_some_and(|section| section.definition == definition)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|item| (item.section, item.position));
        Ok(rows)
    }

    fn swap_section_positions(&self, a: SectionId, b: SectionId) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let position_a = state
            .sections
            .get(&a)
            .ok_or(RepositoryError::NotFound)?
            .position;
        let position_b = state
            .sections
            .get(&b)
            .ok_or(RepositoryError::NotFound)?
            .position;
        if let Some(section) = state.sections.get_mut(&a) {
            section.position = position_b;
        }
        if let Some(section) = state.sections.get_mut(&b) {
            section.position = position_a;
        }
        Ok(())
    }

    fn swap_item_positions(&self, a: ItemId, b: ItemId) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let position_a = state.items.get(&a).ok_or(RepositoryError::NotFound)?.position;
        let position_b = state.items.get(&b).ok_or(RepositoryError::NotFound)?.position;
        if let Some(item) = state.items.get_mut(&a) {
            item.position = position_b;
        }
        if let Some(item) = state.items.get_mut(&b) {
            item.position = position_a;
        }
        Ok(())
    }

    fn apply_removal(&self, batch: RemovalBatch) -> Result<(), RepositoryError> {
        let mut state = self.lock();

        // Validate before mutating so the batch is all-or-nothing.
        for id in &batch.sections {
            if !state.sections.contains_key(id) {
                return Err(RepositoryError::NotFound);
            }
        }
        for id in &batch.items {
            if !state.items.contains_key(id) {
                return Err(RepositoryError::NotFound);
            }
        }
        for (id, _) in &batch.section_positions {
            if !state.sections.contains_key(id) {
                return Err(RepositoryError::NotFound);
            }
        }
        for (id, _) in &batch.item_positions {
            if !state.items.contains_key(id) {
                return Err(RepositoryError::NotFound);
            }
        }

        for item_id in &batch.items {
            state
                .responses
                .retain(|_, response| response.item != *item_id);
            state.configs.remove(item_id);
            state.items.remove(item_id);
        }
        for section_id in &batch.sections {
            state.sections.remove(section_id);
        }
        for (id, position) in &batch.section_positions {
            if let Some(section) = state.sections.get_mut(id) {
                section.position = *position;
            }
        }
        for (id, position) in &batch.item_positions {
            if let Some(item) = state.items.get_mut(id) {
                item.position = *position;
            }
        }
        Ok(())
    }
}

impl ConfigRepository for InMemoryStore {
    fn replace_config(
        &self,
        item: ItemId,
        entries: BTreeMap<String, String>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if !state.items.contains_key(&item) {
            return Err(RepositoryError::NotFound);
        }
        state.configs.insert(item, entries);
        Ok(())
    }

    fn fetch_config(&self, item: ItemId) -> Result<BTreeMap<String, String>, RepositoryError> {
        Ok(self.lock().configs.get(&item).cloned().unwrap_or_default())
    }
}

impl ResponseRepository for InMemoryStore {
    fn fetch_response(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
    ) -> Result<Option<Response>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .responses
            .values()
            .find(|r| r.item == item && r.subject == subject && r.version == version)
            .cloned())
    }

    fn upsert_response(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
        value: Option<String>,
    ) -> Result<Response, RepositoryError> {
        let mut state = self.lock();
        let existing = state
            .responses
            .values()
            .find(|r| r.item == item && r.subject == subject && r.version == version)
            .map(|r| r.id);
        match existing {
            Some(id) => {
                let response = state
                    .responses
                    .get_mut(&id)
                    .ok_or(RepositoryError::NotFound)?;
                response.value = value;
                Ok(response.clone())
            }
            None => {
                state.next_response += 1;
                let response = Response {
                    id: ResponseId(state.next_response),
                    item,
                    subject,
                    version,
                    value,
                    completed: false,
                };
                state.responses.insert(response.id, response.clone());
                Ok(response)
            }
        }
    }

    fn mark_completed(&self, id: ResponseId, completed: bool) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let response = state
            .responses
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        response.completed = completed;
        Ok(())
    }

    fn response_exists(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
    ) -> Result<bool, RepositoryError> {
        let state = self.lock();
        Ok(state
            .responses
            .values()
            .any(|r| r.item == item && r.subject == subject && r.version == version))
    }
}

impl EvaluationRepository for InMemoryStore {
    fn fetch_evaluation(&self, id: EvaluationId) -> Result<Option<Evaluation>, RepositoryError> {
        Ok(self.lock().evaluations.get(&id).cloned())
    }

    fn active_evaluation(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
    ) -> Result<Option<Evaluation>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .evaluations
            .values()
            .find(|e| e.definition == definition && e.subject == subject && e.active)
            .cloned())
    }

    fn insert_evaluation(&self, draft: NewEvaluation) -> Result<Evaluation, RepositoryError> {
        let mut state = self.lock();
        let duplicate = state.evaluations.values().any(|e| {
            e.definition == draft.definition
                && e.subject == draft.subject
                && e.version == draft.version
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        state.next_evaluation += 1;
        let evaluation = Evaluation {
            id: EvaluationId(state.next_evaluation),
            definition: draft.definition,
            subject: draft.subject,
            version: draft.version,
            active: draft.active,
            finalised: draft.finalised,
            finalised_by: None,
            finalised_at: None,
        };
        state.evaluations.insert(evaluation.id, evaluation.clone());
        Ok(evaluation)
    }

    fn update_evaluation(&self, evaluation: &Evaluation) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if !state.evaluations.contains_key(&evaluation.id) {
            return Err(RepositoryError::NotFound);
        }
        state.evaluations.insert(evaluation.id, evaluation.clone());
        Ok(())
    }

    fn supersede(
        &self,
        retiring: EvaluationId,
        replacement: NewEvaluation,
    ) -> Result<Evaluation, RepositoryError> {
        let mut state = self.lock();
        if !state.evaluations.contains_key(&retiring) {
            return Err(RepositoryError::NotFound);
        }
        let duplicate = state.evaluations.values().any(|e| {
            e.definition == replacement.definition
                && e.subject == replacement.subject
                && e.version == replacement.version
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        if let Some(retired) = state.evaluations.get_mut(&retiring) {
            retired.active = false;
        }
        state.next_evaluation += 1;
        let created = Evaluation {
            id: EvaluationId(state.next_evaluation),
            definition: replacement.definition,
            subject: replacement.subject,
            version: replacement.version,
            active: replacement.active,
            finalised: replacement.finalised,
            finalised_by: None,
            finalised_at: None,
        };
        state.evaluations.insert(created.id, created.clone());
        Ok(created)
    }
}

/// File-area fake recording every upload invocation, for tests and demos.
#[derive(Default)]
pub struct InMemoryFileStorage {
    uploads: Mutex<Vec<UploadRecord>>,
}

/// One recorded upload round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub item: ItemId,
    pub subject: SubjectId,
    pub version: u32,
    pub filetypes: Option<String>,
}

impl InMemoryFileStorage {
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().expect("file storage mutex poisoned").clone()
    }
}

impl FileStorage for InMemoryFileStorage {
    fn record_upload(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
        filetypes: Option<&str>,
    ) -> Result<(), FileStorageError> {
        let mut uploads = self.uploads.lock().expect("file storage mutex poisoned");
        uploads.push(UploadRecord {
            item,
            subject,
            version,
            filetypes: filetypes.map(str::to_string),
        });
        Ok(())
    }
}

/// Completion-gate fake capturing every notification, for tests and demos.
#[derive(Default)]
pub struct RecordingCompletionGate {
    notifications: Mutex<Vec<CompletionNotice>>,
}

/// One captured completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionNotice {
    pub definition: DefinitionId,
    pub subject: SubjectId,
    pub version: u32,
    pub progress: CompletionProgress,
}

impl RecordingCompletionGate {
    pub fn notices(&self) -> Vec<CompletionNotice> {
        self.notifications
            .lock()
            .expect("completion gate mutex poisoned")
            .clone()
    }
}

impl CompletionGate for RecordingCompletionGate {
    fn notify_complete(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
        version: u32,
        progress: &CompletionProgress,
    ) {
        let mut notifications = self
            .notifications
            .lock()
            .expect("completion gate mutex poisoned");
        notifications.push(CompletionNotice {
            definition,
            subject,
            version,
            progress: *progress,
        });
    }
}
