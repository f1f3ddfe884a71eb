use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Body returned by the dashboard when anything in the request fails.
pub const DASHBOARD_ERROR_MESSAGE: &str = "Error loading dashboard. Please try again later.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream {endpoint} returned HTTP {status}")]
    UpstreamStatus { endpoint: String, status: u16 },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Schema mismatch in {endpoint}: {detail}")]
    SchemaMismatch { endpoint: String, detail: String },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn schema(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::SchemaMismatch {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Coarse tag used in the JSON snapshot and logs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Network(_) | AppError::UpstreamStatus { .. } => ErrorKind::Network,
            AppError::Parse(_) => ErrorKind::Parse,
            AppError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            AppError::Template(_) | AppError::Config(_) | AppError::Io(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Parse,
    SchemaMismatch,
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, DASHBOARD_ERROR_MESSAGE).into_response()
    }
}
