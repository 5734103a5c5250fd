use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use moodscape_core::{SecurityError, ValidationErrors};
use moodscape_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    /// Duplicate username or email. Reported as a bad request.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_secs: u64,
        limit: u32,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound("Resource not found".to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Security(SecurityError::InvalidToken)
            | ApiError::Security(SecurityError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Store(_) | ApiError::Security(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log.
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Server error".to_string()
        } else {
            self.to_string()
        };

        let body = match &self {
            ApiError::Validation(errors) => json!({
                "success": false,
                "message": message,
                "errors": errors.errors,
            }),
            _ => json!({
                "success": false,
                "message": message,
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited {
            retry_after_secs,
            limit,
            ..
        } = self
        {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
