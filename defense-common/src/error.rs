use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Unified error type shared by all defense components.
#[derive(thiserror::Error, Debug)]
pub enum DefenseError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("secret error: {0}")]
    Secret(String),

    #[error("state store error: {0}")]
    StateStore(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("decision error: {0}")]
    Decision(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DefenseError>;

impl From<String> for DefenseError {
    fn from(s: String) -> Self {
        DefenseError::Other(s)
    }
}

impl From<&str> for DefenseError {
    fn from(s: &str) -> Self {
        DefenseError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for DefenseError {
    fn from(e: serde_json::Error) -> Self {
        DefenseError::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for DefenseError {
    fn from(e: config::ConfigError) -> Self {
        DefenseError::Config(e.to_string())
    }
}

impl From<redis::RedisError> for DefenseError {
    fn from(e: redis::RedisError) -> Self {
        DefenseError::StateStore(e.to_string())
    }
}

impl From<sqlx::Error> for DefenseError {
    fn from(e: sqlx::Error) -> Self {
        DefenseError::StateStore(e.to_string())
    }
}

impl From<reqwest::Error> for DefenseError {
    fn from(e: reqwest::Error) -> Self {
        DefenseError::Upstream(e.to_string())
    }
}

/// Programmer errors and unexpected inconsistencies become 500s; every other
/// kind is either caught internally per the fail-open/fail-closed rules or
/// never reaches an HTTP boundary.
impl IntoResponse for DefenseError {
    fn into_response(self) -> Response {
        let status = match &self {
            DefenseError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DefenseError::StateStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DefenseError::Decision(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DefenseError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DefenseError::Serialization(_) => StatusCode::BAD_REQUEST,
            DefenseError::Secret(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DefenseError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DefenseError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, "internal error").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DefenseError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "configuration error: missing field");
    }

    #[test]
    fn test_error_from_string() {
        let err: DefenseError = "boom".into();
        matches!(err, DefenseError::Other(_));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DefenseError = io_err.into();
        assert!(matches!(err, DefenseError::Io(_)));
    }
}
