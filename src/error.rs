use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use chanmint_api::ApiError;
use chanmint_token::TokenError;

/// Errors surfaced by [`crate::ChannelService`] and the HTTP handlers
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A required field was missing or unusable; never worth retrying
    #[error("{0}")]
    Validation(String),

    /// The signer could not produce a token
    #[error("{0}")]
    Signing(String),

    #[error("identity API request failed: {0}")]
    Upstream(#[from] ApiError),

    #[error("identity API is not configured")]
    IdentityApiUnavailable,

    #[error("configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::IdentityApiUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Validation(msg) => ServiceError::Validation(msg),
            TokenError::Signing(msg) => ServiceError::Signing(msg),
            other => ServiceError::Signing(other.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
