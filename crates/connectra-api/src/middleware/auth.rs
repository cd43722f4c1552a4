//! `X-API-Key` authentication middleware (§6).
//!
//! A single static key configured at startup; every non-health route must
//! present it. Unlike the Bearer/OAuth schemes this is modeled on, there is
//! no scope distinction — the platform has one key, one trust level.

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::AppState;

const API_KEY_HEADER: &str = "x-api-key";

fn is_public_route(path: &str) -> bool {
    path == "/health"
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    if is_public_route(request.uri().path()) {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == state.api_key.as_ref() => next.run(request).await,
        _ => unauthorized(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "success": false,
            "error": "missing or invalid X-API-Key",
            "error_code": "unauthorized",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::is_public_route;

    #[test]
    fn test_health_is_public() {
        assert!(is_public_route("/health"));
        assert!(!is_public_route("/companies/"));
    }
}
