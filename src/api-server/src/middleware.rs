//! Middleware layer for the API server
//!
//! This module provides middleware components for:
//! - Credential authentication
//! - Request logging and tracing
//! - CORS configuration
//! - Request ID tracking
//!
//! Authorization guards live in [`crate::authorization`].

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request ID header name
pub const X_REQUEST_ID: &str = "x-request-id";

/// API key header name
pub const X_API_KEY: &str = "x-api-key";

/// Configure CORS middleware
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static(X_REQUEST_ID),
            header::HeaderName::from_static(X_API_KEY),
        ])
        .expose_headers([header::HeaderName::from_static(X_REQUEST_ID)])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Request ID middleware
///
/// Reuses a valid incoming `x-request-id` or generates one, stores it in the
/// request extensions and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    response
}

/// Request logging middleware
///
/// Logs method, URI, status and latency; the level follows the status class.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<Uuid>()
        .copied()
        .unwrap_or_else(Uuid::new_v4);

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status().as_u16();
    let duration_ms = elapsed.as_millis() as u64;

    match status {
        500..=599 => tracing::error!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
        400..=499 => tracing::warn!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
        _ => tracing::info!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
    }

    response
}

/// Credential presented on the request, if any
///
/// `Authorization: Bearer <token>` wins over `X-API-Key`.
pub fn extract_credential(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| headers.get(X_API_KEY).and_then(|v| v.to_str().ok()))
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// Resolves the presented credential to an [`Identity`](crate::context::Identity)
/// and stores it in the request extensions. Requests without a known
/// credential are rejected with 401.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<Uuid>()
        .copied()
        .unwrap_or_else(Uuid::new_v4);

    let Some(token) = extract_credential(request.headers()).map(str::to_owned) else {
        warn!(request_id = %request_id, path = %request.uri().path(), "Missing credential");
        return ApiError::Unauthorized("missing credential".to_string()).into_response();
    };

    match state.credentials.resolve(&token).await {
        Ok(Some(identity)) => {
            debug!(
                request_id = %request_id,
                principal = %identity.log_id(),
                auth_type = %identity.auth_type(),
                "Credential resolved"
            );
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => {
            warn!(request_id = %request_id, "Unknown credential");
            ApiError::Unauthorized("unknown credential".to_string()).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}
