use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("signature verification failed")]
    Authentication,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("no eligible gateway for client")]
    NoEligibleGateway,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("payout amount exceeds balance due")]
    InsufficientBalance,

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Authentication => "AUTHENTICATION_FAILED",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::NoEligibleGateway => "NO_GATEWAY_AVAILABLE",
            CoreError::Provider(_) => "PROVIDER_ERROR",
            CoreError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            CoreError::Decryption(_) => "DECRYPTION_FAILED",
            CoreError::Db(_) | CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Authentication => StatusCode::UNAUTHORIZED,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::NoEligibleGateway => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Provider(_) => StatusCode::BAD_GATEWAY,
            CoreError::InsufficientBalance => StatusCode::CONFLICT,
            CoreError::Decryption(_) | CoreError::Db(_) | CoreError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        // internal detail stays in logs, not in the response body
        let message = match &self {
            CoreError::Db(e) => {
                tracing::error!("database error: {e}");
                "internal error".to_string()
            }
            CoreError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorEnvelope {
            error: ErrorPayload {
                code: self.code().to_string(),
                message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
