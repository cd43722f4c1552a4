//! The response envelope and error-to-HTTP mapping shared by every handler
//! (§6, §7): `{success, data?, count?, error?, error_code?}`, plus the
//! partial-success bulk-operation shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use connectra_core::Error;
use serde::Serialize;
use serde_json::Value;

/// Wraps `err` as the standard `{success: false, error, error_code}` body,
/// with the HTTP status `connectra_core::Error::status_code` maps it to.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
            "error_code": self.0.error_code(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// `{success: true, data}`, HTTP 200.
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(serde_json::json!({"success": true, "data": data})).into_response()
}

/// `{success: true, data, count}`, HTTP 200 — used by list endpoints.
pub fn ok_with_count<T: Serialize>(data: T, count: usize) -> Response {
    Json(serde_json::json!({"success": true, "data": data, "count": count})).into_response()
}

/// `{success: true, data, count, cursor?}`, HTTP 200 — used by the
/// cursor-paginated VQL list endpoints (§4.6).
pub fn ok_page<T: Serialize>(data: T, count: usize, next_cursor: Option<String>) -> Response {
    Json(serde_json::json!({
        "success": true,
        "data": data,
        "count": count,
        "cursor": next_cursor,
    }))
    .into_response()
}

/// One failing record in a partial-success bulk response (§7).
#[derive(Debug, Serialize)]
pub struct BulkError {
    pub index: usize,
    pub error: String,
}

/// `{total_count, success_count, error_count, errors}`, with the HTTP status
/// per §7: 200 all succeeded, 206 some failed, 500 nothing succeeded.
pub fn bulk_outcome_response(total_count: usize, error_count: usize, errors: Vec<String>) -> Response {
    let success_count = total_count.saturating_sub(error_count);
    let status = if error_count == 0 {
        StatusCode::OK
    } else if success_count == 0 && total_count > 0 {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::PARTIAL_CONTENT
    };

    let body: Value = serde_json::json!({
        "success": error_count == 0,
        "data": {
            "total_count": total_count,
            "success_count": success_count,
            "error_count": error_count,
            "errors": errors.into_iter().enumerate()
                .map(|(index, error)| BulkError { index, error })
                .collect::<Vec<_>>(),
        },
    });
    (status, Json(body)).into_response()
}
