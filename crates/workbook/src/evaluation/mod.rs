//! Evaluation version lifecycle: draft → finalised → superseded.
//!
//! At most one evaluation row is active per (definition, subject) at any
//! time. Finalising locks a version for further responses; creating a new
//! version atomically retires the current one and opens version+1.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::checklist::{ContentRepository, DefinitionId};
use crate::responses::ResponseRepository;
use crate::store::RepositoryError;

/// Identifier of the person being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

/// Identifier of an acting user (e.g. the finaliser). Always passed in
/// explicitly; the core reads no ambient "current user".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

/// Identifier of an evaluation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One evaluation cycle of a subject against a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub definition: DefinitionId,
    pub subject: SubjectId,
    pub version: u32,
    pub active: bool,
    pub finalised: bool,
    pub finalised_by: Option<ActorId>,
    pub finalised_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    /// Responses may only be recorded against an active, unfinalised
    /// version.
    pub fn is_open(&self) -> bool {
        self.active && !self.finalised
    }
}

/// Evaluation draft before the store assigns an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvaluation {
    pub definition: DefinitionId,
    pub subject: SubjectId,
    pub version: u32,
    pub active: bool,
    pub finalised: bool,
}

/// Storage abstraction for evaluation rows. `supersede` must deactivate the
/// retiring row and insert the replacement as one atomic unit: a reader may
/// never observe zero or two active rows for the same (definition, subject).
pub trait EvaluationRepository: Send + Sync {
    fn fetch_evaluation(&self, id: EvaluationId) -> Result<Option<Evaluation>, RepositoryError>;
    fn active_evaluation(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
    ) -> Result<Option<Evaluation>, RepositoryError>;
    fn insert_evaluation(&self, draft: NewEvaluation) -> Result<Evaluation, RepositoryError>;
    fn update_evaluation(&self, evaluation: &Evaluation) -> Result<(), RepositoryError>;
    fn supersede(
        &self,
        retiring: EvaluationId,
        replacement: NewEvaluation,
    ) -> Result<Evaluation, RepositoryError>;
}

/// Completed/required counts over a definition's required items for one
/// subject and version. `required == 0` counts as fully complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionProgress {
    pub completed: u32,
    pub required: u32,
}

impl CompletionProgress {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.required
    }
}

/// Downstream subsystem told when a subject's required set reaches fully
/// complete. The core emits the pair; acting on it is the collaborator's
/// concern.
pub trait CompletionGate: Send + Sync {
    fn notify_complete(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
        version: u32,
        progress: &CompletionProgress,
    );
}

/// Count required and completed-required items for (definition, subject,
/// version). Responses from other versions never count.
pub fn aggregate_completion<S>(
    store: &S,
    definition: DefinitionId,
    subject: SubjectId,
    version: u32,
) -> Result<CompletionProgress, RepositoryError>
where
    S: ContentRepository + ResponseRepository + ?Sized,
{
    let required_items = store.required_items(definition)?;
    let required = required_items.len() as u32;
    let mut completed = 0;
    for item in &required_items {
        if let Some(response) = store.fetch_response(item.id, subject, version)? {
            if response.completed {
                completed += 1;
            }
        }
    }
    Ok(CompletionProgress {
        completed,
        required,
    })
}

/// Result of a finalise attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinaliseOutcome {
    Finalised(Evaluation),
    /// Finalisation is write-once; a second attempt changes nothing.
    AlreadyFinalised,
}

/// Why a re-version request was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionDecline {
    /// Drafts cannot be re-versioned.
    NotFinalised,
    /// The row was already superseded; only the active version re-versions.
    Superseded,
}

/// Result of a create-new-version attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOutcome {
    Created(Evaluation),
    Declined(VersionDecline),
}

/// Failures raised by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("evaluation {0} not found")]
    NotFound(EvaluationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Owns the evaluation state machine and the completion aggregate.
pub struct EvaluationService<S> {
    store: Arc<S>,
}

impl<S> EvaluationService<S>
where
    S: EvaluationRepository + ContentRepository + ResponseRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn evaluation(&self, id: EvaluationId) -> Result<Evaluation, EvaluationError> {
        self.store
            .fetch_evaluation(id)?
            .ok_or(EvaluationError::NotFound(id))
    }

    /// The active evaluation for (definition, subject), if any. Reads never
    /// open a version.
    pub fn active(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
    ) -> Result<Option<Evaluation>, EvaluationError> {
        Ok(self.store.active_evaluation(definition, subject)?)
    }

    /// Return the active evaluation for (definition, subject), creating
    /// version 1 lazily on first interaction.
    pub fn get_or_create_active(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
    ) -> Result<Evaluation, EvaluationError> {
        if let Some(active) = self.store.active_evaluation(definition, subject)? {
            return Ok(active);
        }
        let created = self.store.insert_evaluation(NewEvaluation {
            definition,
            subject,
            version: 1,
            active: true,
            finalised: false,
        })?;
        info!(definition = %definition, subject = %subject, "evaluation opened at version 1");
        Ok(created)
    }

    /// Lock the evaluation for further responses. The finaliser identity and
    /// timestamp are recorded once and never change on repeat calls.
    pub fn finalise(
        &self,
        id: EvaluationId,
        finalised_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<FinaliseOutcome, EvaluationError> {
        let mut evaluation = self.evaluation(id)?;
        if evaluation.finalised {
            return Ok(FinaliseOutcome::AlreadyFinalised);
        }
        evaluation.finalised = true;
        evaluation.finalised_by = Some(finalised_by);
        evaluation.finalised_at = Some(now);
        self.store.update_evaluation(&evaluation)?;
        info!(
            evaluation = %id,
            subject = %evaluation.subject,
            version = evaluation.version,
            finalised_by = %finalised_by,
            "evaluation finalised"
        );
        Ok(FinaliseOutcome::Finalised(evaluation))
    }

    /// Open the next version. Only a finalised AND still-active evaluation
    /// re-versions; the retire-and-insert pair is one atomic unit.
    pub fn create_new_version(&self, id: EvaluationId) -> Result<VersionOutcome, EvaluationError> {
        let current = self.evaluation(id)?;
        if !current.finalised {
            return Ok(VersionOutcome::Declined(VersionDecline::NotFinalised));
        }
        if !current.active {
            return Ok(VersionOutcome::Declined(VersionDecline::Superseded));
        }

        let created = self.store.supersede(
            current.id,
            NewEvaluation {
                definition: current.definition,
                subject: current.subject,
                version: current.version + 1,
                active: true,
                finalised: false,
            },
        )?;
        info!(
            subject = %created.subject,
            definition = %created.definition,
            version = created.version,
            "new evaluation version opened"
        );
        Ok(VersionOutcome::Created(created))
    }

    /// Caller-side gate for response writes.
    pub fn can_record_response(&self, evaluation: &Evaluation) -> bool {
        evaluation.is_open()
    }

    /// Completed/required counts for the given version.
    pub fn completion(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
        version: u32,
    ) -> Result<CompletionProgress, EvaluationError> {
        Ok(aggregate_completion(
            self.store.as_ref(),
            definition,
            subject,
            version,
        )?)
    }
}
