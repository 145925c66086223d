use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::aggregator::SourceHealth;
use crate::query::{self, OverviewSummary, SentimentSummary};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/overview",
    responses((status = 200, description = "Dashboard header counts", body = OverviewSummary))
)]
pub(crate) async fn overview(State(state): State<AppState>) -> Json<OverviewSummary> {
    Json(query::overview(
        &state.aggregator.snapshots(),
        &state.rules.alerts(),
        &state.predictions.load(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/sources",
    responses((status = 200, description = "Per-source ingest health", body = Vec<SourceHealth>))
)]
pub(crate) async fn sources(State(state): State<AppState>) -> Json<Vec<SourceHealth>> {
    Json(state.aggregator.source_health(Utc::now()))
}

#[utoipa::path(
    get,
    path = "/api/sentiment",
    responses((status = 200, description = "Per-source sentiment with 7-day delta", body = Vec<SentimentSummary>))
)]
pub(crate) async fn sentiment(State(state): State<AppState>) -> Json<Vec<SentimentSummary>> {
    Json(query::sentiment_summary(
        &state.aggregator.snapshots(),
        &state.store,
        Utc::now(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/sources", get(sources))
        .route("/sentiment", get(sentiment))
}
