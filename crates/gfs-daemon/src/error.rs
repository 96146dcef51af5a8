//! HTTP error mapping.
//!
//! | kind                                                  | status |
//! |-------------------------------------------------------|--------|
//! | not_found                                             | 404    |
//! | already_approved / already_converted / not_approved   | 409    |
//! | invalid (incl. malformed JSON, bad path or query)     | 400    |
//! | unauthorized                                          | 401    |
//! | storage_failure                                       | 500    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gfs_workflow::{ErrorKind, TransitionError};

use crate::api_types::ErrorResponse;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: ErrorKind::Invalid.as_str(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthorized",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: ErrorKind::NotFound.as_str(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: ErrorKind::StorageFailure.as_str(),
            message: message.into(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyApproved | ErrorKind::AlreadyConverted | ErrorKind::NotApproved => {
            StatusCode::CONFLICT
        }
        ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        let kind = err.kind();
        // Backend detail stays in the log, not the response.
        let message = match kind {
            ErrorKind::StorageFailure => "storage failure; safe to retry".to_string(),
            _ => err.to_string(),
        };
        Self {
            status: status_for(kind),
            kind: kind.as_str(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                kind: self.kind.to_string(),
            }),
        )
            .into_response()
    }
}
