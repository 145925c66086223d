use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::FilterParams;
use crate::error::{AppError, AppResult};
use crate::model::Alert;
use crate::query;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AlertListParams {
    pub sources: Option<String>,
    pub categories: Option<String>,
    pub severity: Option<String>,
    pub confidence_min: Option<f64>,
    pub confidence_max: Option<f64>,
    pub limit: Option<usize>,
}

impl AlertListParams {
    fn into_parts(self) -> (FilterParams, Option<usize>) {
        (
            FilterParams {
                sources: self.sources,
                categories: self.categories,
                severity: self.severity,
                confidence_min: self.confidence_min,
                confidence_max: self.confidence_max,
            },
            self.limit,
        )
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ActorBody {
    pub by: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AssignBody {
    pub assigned_to: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/alerts",
    responses((status = 200, description = "Top alerts by severity then recency", body = Vec<Alert>))
)]
pub(crate) async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
) -> AppResult<Json<Vec<Alert>>> {
    let (filter_params, limit) = params.into_parts();
    let limit = limit.unwrap_or(state.config.default_alert_limit).max(1);
    let filter = filter_params.into_filter()?;
    Ok(Json(query::top_alerts(
        state.rules.alerts(),
        &filter,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/api/alerts/{id}/acknowledge",
    request_body = ActorBody,
    responses(
        (status = 200, description = "Acknowledged", body = Alert),
        (status = 404, description = "Unknown alert"),
        (status = 409, description = "Not open")
    )
)]
pub(crate) async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorBody>,
) -> AppResult<Json<Alert>> {
    let by = actor(&body)?;
    let alert = state.rules.acknowledge_alert(id, &by, Utc::now())?;
    Ok(Json(alert))
}

#[utoipa::path(
    post,
    path = "/api/alerts/{id}/resolve",
    request_body = ActorBody,
    responses(
        (status = 200, description = "Resolved", body = Alert),
        (status = 404, description = "Unknown alert"),
        (status = 409, description = "Already resolved")
    )
)]
pub(crate) async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorBody>,
) -> AppResult<Json<Alert>> {
    let by = actor(&body)?;
    let alert = state.rules.resolve_alert(id, &by, Utc::now())?;
    Ok(Json(alert))
}

#[utoipa::path(
    post,
    path = "/api/alerts/{id}/assign",
    request_body = AssignBody,
    responses(
        (status = 200, description = "Assignment updated", body = Alert),
        (status = 404, description = "Unknown alert"),
        (status = 409, description = "Already resolved")
    )
)]
pub(crate) async fn assign_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignBody>,
) -> AppResult<Json<Alert>> {
    let assignee = body
        .assigned_to
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let alert = state.rules.assign_alert(id, assignee)?;
    Ok(Json(alert))
}

fn actor(body: &ActorBody) -> Result<String, AppError> {
    let by = body.by.trim();
    if by.is_empty() {
        return Err(AppError::bad_request("actor is required"));
    }
    Ok(by.to_string())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/acknowledge", post(acknowledge_alert))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/alerts/{id}/assign", post(assign_alert))
}
