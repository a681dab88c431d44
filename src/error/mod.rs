use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Missing authentication credentials")]
    MissingToken,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature mismatch")]
    BadSignature,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token is not yet valid")]
    TokenNotYetValid,

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Rate limit exceeded. Please try again after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Invalid sector: {0}")]
    InvalidSector(String),

    #[error("Report generation failed")]
    Downstream,
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::MalformedToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadSignature => StatusCode::UNAUTHORIZED,
            ApiError::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiError::TokenNotYetValid => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidSector(_) => StatusCode::BAD_REQUEST,
            ApiError::Downstream => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();

        match &self {
            ApiError::RateLimited { retry_after } => {
                headers.insert(
                    "Retry-After",
                    HeaderValue::from_str(&retry_after.to_string()).unwrap(),
                );
                headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            }
            ApiError::InvalidCredentials => {
                headers.insert("WWW-Authenticate", HeaderValue::from_static("Basic"));
            }
            ApiError::MissingToken
            | ApiError::MalformedToken(_)
            | ApiError::BadSignature
            | ApiError::TokenExpired
            | ApiError::TokenNotYetValid => {
                headers.insert("WWW-Authenticate", HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }

        response
    }
}
