//! Error types for the connectra data platform.

use thiserror::Error;

/// Result type alias using connectra's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for connectra operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Relational store operation failed (wraps sqlx::Error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation failed on caller-supplied input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Search engine operation failed.
    #[error("Search error: {0}")]
    Search(String),

    /// Object storage operation failed.
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Job pipeline failure (captured into job_response.runtime_errors).
    #[error("Job error: {0}")]
    Job(String),

    /// The submitted DAG is not a valid directed acyclic graph.
    #[error("Invalid DAG: {0}")]
    InvalidDag(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed.
    #[error("Request error: {0}")]
    Request(String),

    /// Authentication failed (missing/invalid API key).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Caller exceeded the configured request rate.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// File I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error not classifiable elsewhere.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine code for HTTP error bodies, per the spec's error taxonomy.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Database(_) => "ERR_DATABASE",
            Error::NotFound(_) => "ERR_NOT_FOUND",
            Error::InvalidInput(_) => "ERR_INVALID_INPUT",
            Error::Search(_) => "ERR_SEARCH",
            Error::ObjectStore(_) => "ERR_OBJECT_STORE",
            Error::Job(_) => "ERR_JOB",
            Error::InvalidDag(_) => "ERR_INVALID_DAG",
            Error::Serialization(_) => "ERR_SERIALIZATION",
            Error::Config(_) => "ERR_CONFIG",
            Error::Request(_) => "ERR_REQUEST",
            Error::Unauthorized(_) => "ERR_UNAUTHORIZED",
            Error::Forbidden(_) => "ERR_FORBIDDEN",
            Error::RateLimited(_) => "ERR_RATE_LIMITED",
            Error::Io(_) => "ERR_IO",
            Error::Internal(_) => "ERR_INTERNAL",
        }
    }

    /// HTTP status code this error maps to, per spec.md §7.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) | Error::InvalidDag(_) => 400,
            Error::NotFound(_) => 404,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::RateLimited(_) => 429,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::InvalidInput(format!("csv: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("company 123".to_string());
        assert_eq!(err.to_string(), "Not found: company 123");
    }

    #[test]
    fn test_error_display_invalid_dag() {
        let err = Error::InvalidDag("cycle detected".to_string());
        assert_eq!(err.to_string(), "Invalid DAG: cycle detected");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotFound("x".into()).error_code(), "ERR_NOT_FOUND");
        assert_eq!(
            Error::InvalidInput("x".into()).error_code(),
            "ERR_INVALID_INPUT"
        );
        assert_eq!(Error::RateLimited("x".into()).error_code(), "ERR_RATE_LIMITED");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(Error::Forbidden("x".into()).status_code(), 403);
        assert_eq!(Error::RateLimited("x".into()).status_code(), 429);
        assert_eq!(Error::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
