//! Bearer-key check for the adapter-facing routes

use super::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

/// Rejects `/api/*` requests whose `Authorization: Bearer <key>` does not
/// match `server.api_key`. Without a configured key every request passes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected_key) = &state.api_key else {
        return next.run(request).await;
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.map(bearer_token) {
        Some(Some(provided)) if provided == expected_key => next.run(request).await,
        Some(Some(_)) => unauthorized("Invalid API key"),
        Some(None) => {
            unauthorized("Invalid Authorization header format. Expected: Bearer <api_key>")
        }
        None => unauthorized("API key required. Set Authorization: Bearer <api_key>"),
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
