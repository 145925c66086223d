pub mod alerts;
pub mod correlations;
pub mod health;
pub mod observations;
pub mod overview;
pub mod predictions;
pub mod signals;
pub mod workflows;

use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::model::{Category, Severity};
use crate::query::QueryFilter;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(signals::router())
                .merge(observations::router())
                .merge(alerts::router())
                .merge(correlations::router())
                .merge(predictions::router())
                .merge(workflows::router())
                .merge(overview::router()),
        )
        .with_state(state)
}

/// Wire form of the dashboard filter set: comma-separated lists and an
/// inclusive confidence range. Absent parameters restrict nothing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilterParams {
    pub sources: Option<String>,
    pub categories: Option<String>,
    pub severity: Option<String>,
    pub confidence_min: Option<f64>,
    pub confidence_max: Option<f64>,
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl FilterParams {
    pub fn into_filter(self) -> Result<QueryFilter, AppError> {
        let mut filter = QueryFilter::default();

        if let Some(sources) = &self.sources {
            filter.sources = split_list(sources)
                .map(|value| value.to_lowercase())
                .collect();
        }
        if let Some(categories) = &self.categories {
            for value in split_list(categories) {
                let category = Category::parse(value)
                    .ok_or_else(|| AppError::bad_request(format!("unknown category {value}")))?;
                filter.categories.insert(category);
            }
        }
        if let Some(severity) = &self.severity {
            for value in split_list(severity) {
                let severity = Severity::parse(value)
                    .ok_or_else(|| AppError::bad_request(format!("unknown severity {value}")))?;
                filter.severity.insert(severity);
            }
        }
        if self.confidence_min.is_some() || self.confidence_max.is_some() {
            let lo = self.confidence_min.unwrap_or(0.0);
            let hi = self.confidence_max.unwrap_or(100.0);
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(AppError::bad_request("invalid confidence range"));
            }
            filter.confidence = Some((lo, hi));
        }

        Ok(filter)
    }
}
