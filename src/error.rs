// src/error.rs
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Failures surfaced by every operation of the service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or empty input.
    #[error("{0}")]
    Validation(String),
    /// A hire-request or profile precondition was violated.
    #[error("{0}")]
    InvalidStateTransition(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The access guard refused the pair.
    #[error("{0}")]
    Forbidden(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    /// The durable store or the password hasher failed.
    #[error("upstream failure: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidStateTransition(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to callers. Upstream failures are logged, never echoed.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Upstream(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Upstream(e) = &self {
            tracing::error!("Upstream failure: {:#}", e);
        }
        (status, Json(json!({ "message": self.public_message() }))).into_response()
    }
}
