use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use super::FilterParams;
use crate::error::{AppError, AppResult};
use crate::model::{SignalDescriptor, SignalSnapshot};
use crate::query::{self, SignalDetail};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/signals",
    responses((status = 200, description = "Filtered signal list", body = Vec<SignalSnapshot>))
)]
pub(crate) async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> AppResult<Json<Vec<SignalSnapshot>>> {
    let filter = params.into_filter()?;
    Ok(Json(query::filter_signals(
        &state.aggregator.snapshots(),
        &filter,
    )))
}

#[utoipa::path(
    get,
    path = "/api/signals/{id}",
    responses(
        (status = 200, description = "Signal with its prediction, if any", body = SignalDetail),
        (status = 404, description = "Unknown signal")
    )
)]
pub(crate) async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SignalDetail>> {
    let snapshot = state
        .aggregator
        .snapshot(&id)
        .ok_or_else(|| AppError::not_found(format!("signal {id} not found")))?;
    Ok(Json(query::signal_detail(
        snapshot,
        &state.predictions.load(),
    )))
}

#[utoipa::path(
    put,
    path = "/api/signals",
    request_body = SignalDescriptor,
    responses(
        (status = 200, description = "Registered", body = SignalDescriptor),
        (status = 422, description = "Malformed descriptor")
    )
)]
pub(crate) async fn register_signal(
    State(state): State<AppState>,
    Json(descriptor): Json<SignalDescriptor>,
) -> AppResult<Json<SignalDescriptor>> {
    if descriptor.id.trim().is_empty() {
        return Err(AppError::bad_request("signal id is required"));
    }
    if descriptor.name.trim().is_empty() {
        return Err(AppError::bad_request("signal name is required"));
    }
    if descriptor.source.trim().is_empty() {
        return Err(AppError::bad_request("signal source is required"));
    }
    state.aggregator.register(descriptor.clone());
    Ok(Json(descriptor))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signals", get(list_signals).put(register_signal))
        .route("/signals/{id}", get(get_signal))
}
