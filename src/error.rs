use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::dtr::{LockReason, StoreError, UpdateRejection};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<UpdateRejection> for AppError {
    fn from(rejection: UpdateRejection) -> Self {
        let message = rejection.to_string();
        match rejection {
            UpdateRejection::Locked(LockReason::NoSuchDay(_)) => AppError::NotFound(message),
            UpdateRejection::Locked(LockReason::NotOwner) | UpdateRejection::Forbidden(_) => {
                AppError::Forbidden(message)
            }
            UpdateRejection::Locked(_)
            | UpdateRejection::StaleRevision { .. }
            | UpdateRejection::InvalidTransition { .. } => AppError::Conflict(message),
            UpdateRejection::Conflict(_) => AppError::Validation(message),
            UpdateRejection::InvalidPeriod { .. } => AppError::BadRequest(message),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Rejected(rejection) => rejection.into(),
            StoreError::Database(e) => AppError::Database(e),
            other @ (StoreError::Remote { .. } | StoreError::Transport(_)) => {
                AppError::Internal(other.to_string())
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtr::{RecordStatus, ShiftConflict};

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_rejections_map_to_statuses() {
        assert_eq!(
            status_of(UpdateRejection::Locked(LockReason::NoSuchDay(31))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(UpdateRejection::Locked(LockReason::NotOwner)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(UpdateRejection::Locked(LockReason::RecordLocked(RecordStatus::Approved))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(UpdateRejection::StaleRevision {
                day: 3,
                current: 2,
                received: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(UpdateRejection::Conflict(ShiftConflict::OutNotAfterIn { shift: 0 })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(UpdateRejection::InvalidPeriod { month: 13, year: 2024 }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        assert_eq!(
            status_of(StoreError::NotFound("DTR record 9 not found".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StoreError::Transport("refused".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
