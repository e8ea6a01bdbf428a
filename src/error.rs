use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for the coursegate service
#[derive(Debug, thiserror::Error)]
pub enum CoursegateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Standard error response format for API errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl CoursegateError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns a safe error message suitable for client responses.
    ///
    /// For client errors (4xx), returns the actual error message since these
    /// are typically safe and useful for the client.
    ///
    /// For server errors (5xx), returns a generic message to prevent
    /// information disclosure (CWE-209). The actual error details are
    /// logged server-side but not exposed to clients.
    fn safe_message(&self) -> String {
        match self {
            // Client errors - safe to expose (user needs to know what went wrong)
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::BadRequest(msg) => format!("Bad request: {}", msg),
            Self::Unauthorized(msg) => format!("Unauthorized: {}", msg),
            Self::Forbidden(msg) => format!("Forbidden: {}", msg),

            // Server errors - hide details
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
        }
    }
}

impl IntoResponse for CoursegateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        // Log full error details server-side (not exposed to clients)
        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Request failed"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });

        (status, body).into_response()
    }
}

/// Result type alias for coursegate handlers
pub type Result<T> = std::result::Result<T, CoursegateError>;

// Common error type conversions

impl From<serde_json::Error> for CoursegateError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            CoursegateError::BadRequest(format!("JSON error: {}", err))
        } else {
            CoursegateError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for CoursegateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            CoursegateError::ServiceUnavailable(format!("Gateway connection error: {}", err))
        } else {
            CoursegateError::Internal(format!("Request error: {}", err))
        }
    }
}
