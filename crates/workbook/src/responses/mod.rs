//! Response rows and the save pipeline shared by every item type.
//!
//! A response is keyed by (item, subject, version); absence is a valid state
//! meaning "unanswered". Saves are gated on the owning evaluation being open
//! and delegated to the item's type behavior, which decides both what to
//! store and when the item counts as completed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checklist::{ContentRepository, ItemId, SectionId};
use crate::evaluation::{self, CompletionGate, Evaluation, SubjectId};
use crate::store::RepositoryError;
use crate::types::{
    ConfigRepository, FileStorage, FileStorageError, ItemTypeRegistry, SaveContext,
};

/// Identifier of a response row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub u64);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded answer, pinned to a single evaluation version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub item: ItemId,
    pub subject: SubjectId,
    pub version: u32,
    pub value: Option<String>,
    pub completed: bool,
}

/// Storage abstraction for response rows. At most one row exists per
/// (item, subject, version); `upsert_response` inserts or updates the value.
pub trait ResponseRepository: Send + Sync {
    fn fetch_response(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
    ) -> Result<Option<Response>, RepositoryError>;
    fn upsert_response(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
        value: Option<String>,
    ) -> Result<Response, RepositoryError>;
    fn mark_completed(&self, id: ResponseId, completed: bool) -> Result<(), RepositoryError>;
    fn response_exists(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
    ) -> Result<bool, RepositoryError>;
}

/// Business-rule declines. These are expected outcomes, not failures, and
/// leave prior state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveDecline {
    /// The evaluation is finalised or superseded.
    EvaluationClosed,
    /// A text item rejected an empty or whitespace-only answer.
    EmptyResponse,
}

/// Result of a save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(Response),
    Declined(SaveDecline),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

/// Failures raised by the response pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("item {0} not found")]
    ItemNotFound(ItemId),
    #[error("item {item} references missing section {section}")]
    OrphanedItem { item: ItemId, section: SectionId },
    #[error("unknown item type '{0}'")]
    UnknownItemType(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    File(#[from] FileStorageError),
}

/// Saves and reads responses, dispatching on the item's type behavior and
/// notifying the completion gate when a save pushes the subject's required
/// set to fully complete.
pub struct ResponseService<S, F, G> {
    store: Arc<S>,
    files: Arc<F>,
    gate: Arc<G>,
    registry: Arc<ItemTypeRegistry>,
}

impl<S, F, G> ResponseService<S, F, G>
where
    S: ContentRepository + ConfigRepository + ResponseRepository,
    F: FileStorage,
    G: CompletionGate,
{
    pub fn new(
        store: Arc<S>,
        files: Arc<F>,
        gate: Arc<G>,
        registry: Arc<ItemTypeRegistry>,
    ) -> Self {
        Self {
            store,
            files,
            gate,
            registry,
        }
    }

    /// Save an answer against the given evaluation. The caller gate applies
    /// first: a finalised or superseded evaluation declines the save before
    /// anything is touched.
    pub fn save(
        &self,
        item_id: ItemId,
        evaluation: &Evaluation,
        raw: Option<&str>,
    ) -> Result<SaveOutcome, ResponseError> {
        if !evaluation.is_open() {
            return Ok(SaveOutcome::Declined(SaveDecline::EvaluationClosed));
        }

        let item = self
            .store
            .fetch_item(item_id)?
            .ok_or(ResponseError::ItemNotFound(item_id))?;
        let behavior = self
            .registry
            .get(&item.item_type)
            .ok_or_else(|| ResponseError::UnknownItemType(item.item_type.clone()))?;

        let ctx = SaveContext {
            item: &item,
            subject: evaluation.subject,
            version: evaluation.version,
            responses: self.store.as_ref(),
            configs: self.store.as_ref(),
            files: self.files.as_ref(),
        };
        let outcome = behavior.save_response(&ctx, raw)?;

        if let SaveOutcome::Saved(response) = &outcome {
            debug!(
                item = %item.id,
                subject = %evaluation.subject,
                version = evaluation.version,
                completed = response.completed,
                "response saved"
            );
            if response.completed {
                self.notify_if_complete(&item, evaluation)?;
            }
        }
        Ok(outcome)
    }

    /// The stored response, or `None` when the item is unanswered for this
    /// subject and version.
    pub fn get(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
    ) -> Result<Option<Response>, ResponseError> {
        Ok(self.store.fetch_response(item, subject, version)?)
    }

    fn notify_if_complete(
        &self,
        item: &crate::checklist::Item,
        evaluation: &Evaluation,
    ) -> Result<(), ResponseError> {
        let section = self
            .store
            .fetch_section(item.section)?
            .ok_or(ResponseError::OrphanedItem {
                item: item.id,
                section: item.section,
            })?;
        let progress = evaluation::aggregate_completion(
            self.store.as_ref(),
            section.definition,
            evaluation.subject,
            evaluation.version,
        )?;
        if progress.required > 0 && progress.is_complete() {
            self.gate.notify_complete(
                section.definition,
                evaluation.subject,
                evaluation.version,
                &progress,
            );
        }
        Ok(())
    }
}
