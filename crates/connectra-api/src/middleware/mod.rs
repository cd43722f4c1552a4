pub mod auth;
pub mod rate_limit;

pub use auth::auth_middleware;
pub use rate_limit::{build_limiter, rate_limit_middleware, GlobalRateLimiter};
