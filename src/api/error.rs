//! JSON error responses for the control API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::session::SessionError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// The service loop that executes session commands has stopped.
    pub fn loop_stopped() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Session loop is not running".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match err {
            SessionError::Disposed => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Abandoned(_) => StatusCode::CONFLICT,
            SessionError::TokenFetchFailed(_) | SessionError::JoinFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            SessionError::MicrophoneToggleFailed(_) | SessionError::DisconnectFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
