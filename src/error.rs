use thiserror::Error;

use crate::tokens::TokenizeError;

#[derive(Error, Debug)]
pub enum GlFetchError {
    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("API returned HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("Malformed JSON for project {project_id}: {reason}")]
    MalformedResponse { project_id: i64, reason: String },

    #[error("Malformed pipeline #{index} for project {project_id}: {reason}")]
    MalformedChild {
        project_id: i64,
        index: usize,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GlFetchError {
    pub fn malformed(project_id: i64, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            project_id,
            reason: reason.into(),
        }
    }

    pub fn tokenize(project_id: i64, err: &TokenizeError) -> Self {
        Self::malformed(project_id, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GlFetchError>;
