//! Global rate-limiting middleware, backed by `governor` (§6:
//! `MAX_REQUESTS_PER_MINUTE`).

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::AppState;

pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Build a limiter admitting `max_requests_per_minute` requests per minute,
/// evenly spaced (`governor`'s `with_period` quota).
pub fn build_limiter(max_requests_per_minute: u64) -> Arc<GlobalRateLimiter> {
    let per_minute = NonZeroU32::new(max_requests_per_minute.max(1) as u32)
        .unwrap_or(NonZeroU32::new(1).unwrap());
    let quota = Quota::per_minute(per_minute);
    Arc::new(RateLimiter::direct(quota))
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    if state.rate_limiter.check().is_err() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "success": false,
                "error": "rate limit exceeded",
                "error_code": "rate_limited",
            })),
        )
            .into_response();
    }
    next.run(request).await
}
