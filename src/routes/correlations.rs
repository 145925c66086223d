use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::query::{self, CorrelationMatrixView};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/correlations",
    responses((status = 200, description = "Latest non-weak correlation edges", body = CorrelationMatrixView))
)]
pub(crate) async fn correlation_matrix(
    State(state): State<AppState>,
) -> Json<CorrelationMatrixView> {
    Json(query::correlation_matrix(&state.correlations.load()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/correlations", get(correlation_matrix))
}
