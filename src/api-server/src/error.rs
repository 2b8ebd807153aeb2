use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shelf_authz::AuthzError;

use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, ApiError>;

/// HTTP-facing errors
///
/// The payload of each variant is for logs only. Responses carry a fixed
/// message per variant so no policy detail or resource state leaks out.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Project not found")]
    ProjectNotFound,

    /// Also used for resources that exist in another project
    #[error("Resource not found")]
    ResourceNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Data layer lookup timed out")]
    Timeout,

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ProjectNotFound | ApiError::ResourceNotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to return to the caller
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Unauthorized(_) => "authentication required".to_string(),
            ApiError::Forbidden(_) => "forbidden".to_string(),
            ApiError::ProjectNotFound => "project not found".to_string(),
            ApiError::ResourceNotFound => "resource not found".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Timeout => "service unavailable".to_string(),
            ApiError::Repository(_) => "internal server error".to_string(),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NilSubject => ApiError::Unauthorized(err.to_string()),
            other => ApiError::Forbidden(format!("{} ({})", other, other.code())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
