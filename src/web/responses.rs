use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppError;

/// Error surface of the HTTP API. Every variant renders as `{"error": msg}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    ScraperFailed(String),
    ScraperTimeout(String),
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ScraperFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::ScraperTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::ScraperFailed(msg)
            | ApiError::ScraperTimeout(msg)
            | ApiError::Internal(msg) => msg.clone(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.message(),
        });

        match self {
            ApiError::Unauthorized => (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"listing-watcher\"")],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            AppError::Validation(_) => ApiError::BadRequest(err.to_string()),
            AppError::ScraperExit { .. } => ApiError::ScraperFailed(err.to_string()),
            AppError::ScraperTimeout { .. } => ApiError::ScraperTimeout(err.to_string()),
            other => {
                // Storage and I/O details stay in the log.
                tracing::error!(error = %other, "Request failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::from(AppError::from(errors))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body returned by the flag-toggling endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
}

impl StatusMessage {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Body returned after a configuration set has been replaced.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplaceResponse {
    pub status: String,
    pub count: usize,
}

impl ReplaceResponse {
    pub fn new(count: usize) -> Self {
        Self {
            status: "ok".to_string(),
            count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
    pub duration_ms: Option<u64>,
}

impl HealthCheck {
    pub fn healthy(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: "healthy".to_string(),
            message: None,
            duration_ms: Some(duration_ms),
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: "unhealthy".to_string(),
            message: Some(message.into()),
            duration_ms: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

impl HealthResponse {
    pub fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let status = if checks.iter().all(HealthCheck::is_healthy) {
            "healthy"
        } else {
            "unhealthy"
        };

        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
