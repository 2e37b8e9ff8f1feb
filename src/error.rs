use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Body from {url} hashes to {actual}, metadata advertised {expected}")]
    ContentMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Selection was made on snapshot {selected}, current is {current}")]
    StaleSelection { selected: String, current: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record {key}: bad {field}: {reason}")]
    Parse {
        key: String,
        field: &'static str,
        reason: String,
    },

    #[error("Empty selection for {0}")]
    EmptySelection(&'static str),

    #[error("Aggregate invariant violated: {0}")]
    DegenerateAggregate(String),

    #[error("No snapshot loaded yet")]
    NotLoaded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub(crate) fn parse(key: &str, field: &'static str, reason: impl Into<String>) -> Self {
        AppError::Parse {
            key: key.to_string(),
            field,
            reason: reason.into(),
        }
    }

    /// Whether another attempt within the same refresh cycle could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AppError::Status { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::EmptySelection(_) => StatusCode::BAD_REQUEST,
            AppError::StaleSelection { .. } => StatusCode::CONFLICT,
            AppError::NotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Http(_)
            | AppError::Status { .. }
            | AppError::Metadata(_)
            | AppError::ContentMismatch { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
