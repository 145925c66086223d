use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::model::Observation;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct IngestAccepted {
    pub status: String,
}

/// Ingest boundary. Rejections are typed: stale and malformed records are
/// 422, a full queue is 429 so the caller can back off and retry.
#[utoipa::path(
    post,
    path = "/api/observations",
    request_body = Observation,
    responses(
        (status = 202, description = "Queued for the pipeline", body = IngestAccepted),
        (status = 422, description = "Malformed or stale observation"),
        (status = 429, description = "Ingest queue full")
    )
)]
pub(crate) async fn submit_observation(
    State(state): State<AppState>,
    Json(observation): Json<Observation>,
) -> AppResult<(StatusCode, Json<IngestAccepted>)> {
    state.ingest.submit(observation)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(IngestAccepted {
            status: "accepted".to_string(),
        }),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/observations", post(submit_observation))
}
