//! `GET /health` (§6): liveness probe, intentionally outside the standard
//! response envelope.

use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn health() -> Response {
    Json(serde_json::json!({"status": "ok"})).into_response()
}
