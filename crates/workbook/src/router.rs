//! HTTP surface mirroring the core operations one-for-one.
//!
//! Authorization is a caller concern: every request reaching this router is
//! assumed to be permitted already. Business declines answer 409 with a
//! `declined` reason so clients can tell them apart from not-found and
//! invalid-payload failures.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::checklist::{
    ContentError, ContentTreeService, DefinitionId, ItemId, MoveDirection, SectionId,
};
use crate::evaluation::{
    ActorId, CompletionGate, EvaluationError, EvaluationId, EvaluationService, FinaliseOutcome,
    SubjectId, VersionOutcome,
};
use crate::responses::{ResponseError, ResponseService, SaveOutcome};
use crate::store::{RepositoryError, WorkbookStore};
use crate::types::{FileStorage, ItemTypeRegistry};

/// The full service stack behind the router.
pub struct WorkbookServices<S, F, G> {
    pub content: ContentTreeService<S>,
    pub responses: ResponseService<S, F, G>,
    pub evaluations: EvaluationService<S>,
}

impl<S, F, G> WorkbookServices<S, F, G>
where
    S: WorkbookStore,
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
            content: ContentTreeService::new(store.clone(), registry.clone()),
            responses: ResponseService::new(store.clone(), files, gate, registry),
            evaluations: EvaluationService::new(store),
        }
    }
}

/// Router builder over the shared services.
pub fn workbook_router<S, F, G>(services: Arc<WorkbookServices<S, F, G>>) -> Router
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    Router::new()
        .route(
            "/api/v1/checklist/sections",
            post(add_section_handler::<S, F, G>),
        )
        .route(
            "/api/v1/checklist/definitions/:definition_id/sections",
            get(root_sections_handler::<S, F, G>),
        )
        .route(
            "/api/v1/checklist/sections/:section_id",
            get(section_detail_handler::<S, F, G>)
                .patch(update_section_handler::<S, F, G>)
                .delete(delete_section_handler::<S, F, G>),
        )
        .route(
            "/api/v1/checklist/sections/:section_id/items",
            post(add_item_handler::<S, F, G>),
        )
        .route(
            "/api/v1/checklist/items/:item_id",
            get(item_detail_handler::<S, F, G>)
                .patch(update_item_handler::<S, F, G>)
                .delete(delete_item_handler::<S, F, G>),
        )
        .route(
            "/api/v1/checklist/items/:item_id/response",
            put(save_response_handler::<S, F, G>),
        )
        .route("/api/v1/evaluations", post(open_evaluation_handler::<S, F, G>))
        .route(
            "/api/v1/evaluations/:evaluation_id/finalise",
            post(finalise_handler::<S, F, G>),
        )
        .route(
            "/api/v1/evaluations/:evaluation_id/versions",
            post(new_version_handler::<S, F, G>),
        )
        .route(
            "/api/v1/evaluations/progress",
            get(progress_handler::<S, F, G>),
        )
        .with_state(services)
}

#[derive(Debug, Deserialize)]
struct AddSectionRequest {
    definition_id: DefinitionId,
    name: String,
    parent_section_id: Option<SectionId>,
}

#[derive(Debug, Deserialize)]
struct UpdateSectionRequest {
    name: Option<String>,
    #[serde(rename = "move")]
    movement: Option<MoveDirection>,
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    name: String,
    description: Option<String>,
    #[serde(default = "default_required")]
    is_required: bool,
    item_type: String,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct UpdateItemRequest {
    name: Option<String>,
    /// An empty string clears the description.
    description: Option<String>,
    is_required: Option<bool>,
    #[serde(rename = "move")]
    movement: Option<MoveDirection>,
    config: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct SaveResponseRequest {
    subject_id: SubjectId,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenEvaluationRequest {
    definition_id: DefinitionId,
    subject_id: SubjectId,
}

#[derive(Debug, Deserialize)]
struct FinaliseRequest {
    finalised_by: ActorId,
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    definition_id: DefinitionId,
    subject_id: SubjectId,
    version: Option<u32>,
}

async fn add_section_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Json(request): Json<AddSectionRequest>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services.content.add_section(
        request.definition_id,
        &request.name,
        request.parent_section_id,
    ) {
        Ok(section) => (StatusCode::CREATED, Json(section)).into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn root_sections_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(definition_id): Path<DefinitionId>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services.content.list_root_sections(definition_id) {
        Ok(sections) => (StatusCode::OK, Json(sections)).into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn section_detail_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(section_id): Path<SectionId>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    let detail = services.content.section(section_id).and_then(|section| {
        let subsections = services.content.list_subsections(section_id)?;
        let items = services.content.list_items(section_id)?;
        Ok(json!({
            "section": section,
            "subsections": subsections,
            "items": items,
        }))
    });
    match detail {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn update_section_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(section_id): Path<SectionId>,
    Json(request): Json<UpdateSectionRequest>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    let updated = (|| {
        if let Some(name) = &request.name {
            services.content.rename_section(section_id, name)?;
        }
        if let Some(direction) = request.movement {
            services.content.move_section(section_id, direction)?;
        }
        services.content.section(section_id)
    })();
    match updated {
        Ok(section) => (StatusCode::OK, Json(section)).into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn delete_section_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(section_id): Path<SectionId>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services.content.delete_section(section_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn add_item_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(section_id): Path<SectionId>,
    Json(request): Json<AddItemRequest>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services.content.add_item(
        section_id,
        &request.name,
        request.description.as_deref(),
        request.is_required,
        &request.item_type,
    ) {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn item_detail_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(item_id): Path<ItemId>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    let detail = services.content.item(item_id).and_then(|item| {
        let config = services.content.item_config(item_id)?;
        Ok(json!({ "item": item, "config": config }))
    });
    match detail {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn update_item_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(item_id): Path<ItemId>,
    Json(request): Json<UpdateItemRequest>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    let updated = (|| {
        if let Some(name) = &request.name {
            services.content.rename_item(item_id, name)?;
        }
        if let Some(description) = &request.description {
            let description = (!description.is_empty()).then_some(description.as_str());
            services.content.set_item_description(item_id, description)?;
        }
        if let Some(is_required) = request.is_required {
            services.content.set_item_required(item_id, is_required)?;
        }
        if let Some(config) = &request.config {
            services.content.update_item_config(item_id, config)?;
        }
        if let Some(direction) = request.movement {
            services.content.move_item(item_id, direction)?;
        }
        services.content.item(item_id)
    })();
    match updated {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn delete_item_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(item_id): Path<ItemId>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services.content.delete_item(item_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => content_error_response(error),
    }
}

async fn save_response_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(item_id): Path<ItemId>,
    Json(request): Json<SaveResponseRequest>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    let item = match services.content.item(item_id) {
        Ok(item) => item,
        Err(error) => return content_error_response(error),
    };
    let section = match services.content.section(item.section) {
        Ok(section) => section,
        Err(error) => return content_error_response(error),
    };
    let evaluation = match services
        .evaluations
        .get_or_create_active(section.definition, request.subject_id)
    {
        Ok(evaluation) => evaluation,
        Err(error) => return evaluation_error_response(error),
    };

    match services
        .responses
        .save(item_id, &evaluation, request.value.as_deref())
    {
        Ok(SaveOutcome::Saved(response)) => (
            StatusCode::OK,
            Json(json!({ "saved": true, "response": response })),
        )
            .into_response(),
        Ok(SaveOutcome::Declined(reason)) => (
            StatusCode::CONFLICT,
            Json(json!({ "saved": false, "declined": reason })),
        )
            .into_response(),
        Err(error) => response_error_response(error),
    }
}

async fn open_evaluation_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Json(request): Json<OpenEvaluationRequest>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services
        .evaluations
        .get_or_create_active(request.definition_id, request.subject_id)
    {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation)).into_response(),
        Err(error) => evaluation_error_response(error),
    }
}

async fn finalise_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(evaluation_id): Path<EvaluationId>,
    Json(request): Json<FinaliseRequest>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services
        .evaluations
        .finalise(evaluation_id, request.finalised_by, Utc::now())
    {
        Ok(FinaliseOutcome::Finalised(evaluation)) => {
            (StatusCode::OK, Json(evaluation)).into_response()
        }
        Ok(FinaliseOutcome::AlreadyFinalised) => (
            StatusCode::CONFLICT,
            Json(json!({ "declined": "already_finalised" })),
        )
            .into_response(),
        Err(error) => evaluation_error_response(error),
    }
}

async fn new_version_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Path(evaluation_id): Path<EvaluationId>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    match services.evaluations.create_new_version(evaluation_id) {
        Ok(VersionOutcome::Created(evaluation)) => {
            (StatusCode::CREATED, Json(evaluation)).into_response()
        }
        Ok(VersionOutcome::Declined(reason)) => (
            StatusCode::CONFLICT,
            Json(json!({ "declined": reason })),
        )
            .into_response(),
        Err(error) => evaluation_error_response(error),
    }
}

async fn progress_handler<S, F, G>(
    State(services): State<Arc<WorkbookServices<S, F, G>>>,
    Query(query): Query<ProgressQuery>,
) -> Response
where
    S: WorkbookStore + 'static,
    F: FileStorage + 'static,
    G: CompletionGate + 'static,
{
    // A GET must not lazily open version 1, so resolve the version from the
    // active row instead of get_or_create.
    let version = match query.version {
        Some(version) => version,
        None => {
            let active = services
                .evaluations
                .active(query.definition_id, query.subject_id);
            match active {
                Ok(Some(evaluation)) => evaluation.version,
                Ok(None) => {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "error": "no evaluation for subject" })),
                    )
                        .into_response()
                }
                Err(error) => return evaluation_error_response(error),
            }
        }
    };

    match services
        .evaluations
        .completion(query.definition_id, query.subject_id, version)
    {
        Ok(progress) => (
            StatusCode::OK,
            Json(json!({
                "completed": progress.completed,
                "required": progress.required,
                "complete": progress.is_complete(),
                "version": version,
            })),
        )
            .into_response(),
        Err(error) => evaluation_error_response(error),
    }
}

fn content_error_response(error: ContentError) -> Response {
    let status = match &error {
        ContentError::SectionNotFound(_) | ContentError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        ContentError::UnknownItemType(_) | ContentError::Config(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ContentError::Integrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ContentError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ContentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn evaluation_error_response(error: EvaluationError) -> Response {
    let status = match &error {
        EvaluationError::NotFound(_) => StatusCode::NOT_FOUND,
        EvaluationError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        EvaluationError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn response_error_response(error: ResponseError) -> Response {
    let status = match &error {
        ResponseError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        ResponseError::UnknownItemType(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ResponseError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ResponseError::OrphanedItem { .. }
        | ResponseError::Repository(_)
        | ResponseError::File(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
