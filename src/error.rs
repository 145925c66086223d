use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Typed rejections at the ingest boundary. The engine never retries a
/// rejected observation; callers own retry policy.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("observation at {timestamp} is older than the retention floor {floor}")]
    RejectedStale {
        timestamp: DateTime<Utc>,
        floor: DateTime<Utc>,
    },
    #[error("ingest queue is full")]
    Busy,
    #[error("invalid observation: {0}")]
    InvalidObservation(String),
}

/// Aggregator-side distinction between "no signal yet" and "low score":
/// a signal below the minimum sample count is unscored, never zero.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("unknown signal {0}")]
    UnknownSignal(String),
    #[error("insufficient data for {signal_id}: {samples} of {required} samples")]
    InsufficientData {
        signal_id: String,
        samples: u64,
        required: u64,
    },
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),
    #[error("workflow {0} not found")]
    NotFound(Uuid),
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert {0} not found")]
    NotFound(Uuid),
    #[error("alert {id} is already {status}")]
    InvalidTransition { id: Uuid, status: String },
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let status = match err {
            IngestError::Busy => StatusCode::TOO_MANY_REQUESTS,
            IngestError::RejectedStale { .. } | IngestError::InvalidObservation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        let status = match err {
            WorkflowError::InvalidDefinition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        Self::new(status, err.to_string())
    }
}

impl From<AlertError> for AppError {
    fn from(err: AlertError) -> Self {
        let status = match err {
            AlertError::NotFound(_) => StatusCode::NOT_FOUND,
            AlertError::InvalidTransition { .. } => StatusCode::CONFLICT,
        };
        Self::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_429() {
        let err: AppError = IngestError::Busy.into();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn stale_rejection_maps_to_422() {
        let now = Utc::now();
        let err: AppError = IngestError::RejectedStale {
            timestamp: now,
            floor: now,
        }
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unknown_workflow_maps_to_404() {
        let err: AppError = WorkflowError::NotFound(Uuid::nil()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
