//! Handler error type and its mapping onto the response envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use siad_core::envelope::ApiEnvelope;
use siad_core::flow::FlowError;
use siad_core::jobs::TransitionError;
use siad_storage::StorageError;

/// An error answered as `{status: "error", message, data: null}` with the
/// given HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                message = %self.message,
                "request failed"
            );
        }
        (self.status, Json(ApiEnvelope::<()>::error(self.message))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { .. } => ApiError::not_found(e.to_string()),
            StorageError::Duplicate { .. } | StorageError::Conflict(_) => {
                ApiError::conflict(e.to_string())
            }
            StorageError::Backend(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::NoSigners | FlowError::DuplicateSigner(_) => {
                ApiError::bad_request(e.to_string())
            }
            FlowError::NotYourTurn { .. } => ApiError::forbidden(e.to_string()),
            FlowError::Closed { .. } | FlowError::Halted => ApiError::conflict(e.to_string()),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        ApiError::conflict(e.to_string())
    }
}

/// Result type of every JSON handler.
pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_http_statuses() {
        let e: ApiError = StorageError::not_found("document", "d9").into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        let e: ApiError = StorageError::Conflict("in use".into()).into();
        assert_eq!(e.status, StatusCode::CONFLICT);
        let e: ApiError = StorageError::duplicate("archivador", "ARC-1").into();
        assert_eq!(e.status, StatusCode::CONFLICT);
        let e: ApiError = StorageError::Backend("disk".into()).into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn flow_errors_map_to_http_statuses() {
        let e: ApiError = FlowError::NotYourTurn {
            user_id: "u2".into(),
        }
        .into();
        assert_eq!(e.status, StatusCode::FORBIDDEN);
        let e: ApiError = FlowError::Halted.into();
        assert_eq!(e.status, StatusCode::CONFLICT);
    }
}
