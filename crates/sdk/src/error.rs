//! Error types for the VCD SDK

use thiserror::Error;

/// Result type alias using the SDK Error
pub type Result<T> = std::result::Result<T, Error>;

/// SDK error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Marker prefix matches what callers grep for in logs
    #[error("[ENF] entity not found: {kind} '{id}'")]
    NotFound { kind: String, id: String },

    #[error("more than one {kind} found with {field} '{value}'")]
    Ambiguous {
        kind: String,
        field: String,
        value: String,
    },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("task {operation} failed: {message}")]
    Task { operation: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Whether the error means the remote entity does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Api { status, .. } => *status == 404,
            _ => false,
        }
    }
}
