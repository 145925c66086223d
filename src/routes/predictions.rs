use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use super::FilterParams;
use crate::error::AppResult;
use crate::predictor::PredictionSnapshot;
use crate::query::{self, RiskEntry};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/predictions",
    responses((status = 200, description = "Latest published prediction set", body = PredictionSnapshot))
)]
pub(crate) async fn list_predictions(State(state): State<AppState>) -> Json<PredictionSnapshot> {
    Json((*state.predictions.load()).clone())
}

#[utoipa::path(
    get,
    path = "/api/risk",
    responses((status = 200, description = "Signals ranked by impact-weighted spike risk", body = Vec<RiskEntry>))
)]
pub(crate) async fn risk_list(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> AppResult<Json<Vec<RiskEntry>>> {
    let filter = params.into_filter()?;
    Ok(Json(query::risk_list(
        &state.predictions.load(),
        &state.aggregator.snapshots(),
        &filter,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/predictions", get(list_predictions))
        .route("/risk", get(risk_list))
}
