use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::WorkflowStatus;
use crate::rules::types::WorkflowDefinition;
use crate::rules::{WorkflowInfo, WorkflowRun};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/workflows",
    responses((status = 200, description = "All workflows with live status", body = Vec<WorkflowInfo>))
)]
pub(crate) async fn list_workflows(State(state): State<AppState>) -> Json<Vec<WorkflowInfo>> {
    Json(state.rules.workflows())
}

#[utoipa::path(
    post,
    path = "/api/workflows",
    request_body = WorkflowDefinition,
    responses(
        (status = 201, description = "Created", body = WorkflowInfo),
        (status = 422, description = "Invalid definition")
    )
)]
pub(crate) async fn create_workflow(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> AppResult<(StatusCode, Json<WorkflowInfo>)> {
    let info = state.rules.create_workflow(definition, Utc::now())?;
    Ok((StatusCode::CREATED, Json(info)))
}

#[utoipa::path(
    put,
    path = "/api/workflows/{id}",
    request_body = WorkflowDefinition,
    responses(
        (status = 200, description = "Updated", body = WorkflowInfo),
        (status = 404, description = "Unknown workflow"),
        (status = 422, description = "Invalid definition")
    )
)]
pub(crate) async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(definition): Json<WorkflowDefinition>,
) -> AppResult<Json<WorkflowInfo>> {
    let info = state.rules.update_workflow(id, definition, Utc::now())?;
    Ok(Json(info))
}

#[utoipa::path(
    post,
    path = "/api/workflows/{id}/pause",
    responses(
        (status = 200, description = "Paused", body = WorkflowInfo),
        (status = 404, description = "Unknown workflow")
    )
)]
pub(crate) async fn pause_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WorkflowInfo>> {
    let info = state
        .rules
        .set_status(id, WorkflowStatus::Paused, Utc::now())?;
    Ok(Json(info))
}

#[utoipa::path(
    post,
    path = "/api/workflows/{id}/resume",
    responses(
        (status = 200, description = "Resumed", body = WorkflowInfo),
        (status = 404, description = "Unknown workflow")
    )
)]
pub(crate) async fn resume_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WorkflowInfo>> {
    let info = state
        .rules
        .set_status(id, WorkflowStatus::Active, Utc::now())?;
    Ok(Json(info))
}

#[utoipa::path(
    get,
    path = "/api/workflows/{id}/runs",
    responses(
        (status = 200, description = "Rolling run history", body = Vec<WorkflowRun>),
        (status = 404, description = "Unknown workflow")
    )
)]
pub(crate) async fn workflow_runs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<WorkflowRun>>> {
    Ok(Json(state.rules.workflow_runs(id)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workflows", get(list_workflows).post(create_workflow))
        .route("/workflows/{id}", put(update_workflow))
        .route("/workflows/{id}/pause", post(pause_workflow))
        .route("/workflows/{id}/resume", post(resume_workflow))
        .route("/workflows/{id}/runs", get(workflow_runs))
}
