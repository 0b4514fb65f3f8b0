//! Error types for Clusterlens

use thiserror::Error;

/// Result type alias using Clusterlens's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Clusterlens error types with helpful messages and suggestions
///
/// Absence is never an error here: a URI that is not a cluster, a member
/// without a link target, or a target unknown to the knowledge base all
/// surface as `Option`/`Resolution` values from the model layer.
#[derive(Error, Debug)]
pub enum Error {
    // Gateway errors (E100-E199)
    #[error("Network error: {0}. Check that the query endpoint is reachable.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Query endpoint returned HTTP {status}: {body}")]
    EndpointError { status: u16, body: String },

    #[error("Malformed query response: {0}")]
    MalformedResponse(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // Cache errors (E200-E299)
    #[error("Cache file format error: {0}. Rebuild with `clusterlens build-cache`.")]
    CacheFormat(#[from] serde_json::Error),

    // Config errors (E300-E399)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E400-E499)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError(_) => "E100",
            Self::EndpointError { .. } => "E101",
            Self::MalformedResponse(_) => "E102",
            Self::InvalidQuery(_) => "E103",
            Self::CacheFormat(_) => "E200",
            Self::ConfigError(_) => "E300",
            Self::InvalidInput(_) => "E400",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("clusterlens doctor".to_string()),
            Self::EndpointError { .. } => Some("clusterlens doctor".to_string()),
            Self::CacheFormat(_) => Some("clusterlens build-cache".to_string()),
            Self::ConfigError(_) => Some("clusterlens config list".to_string()),
            _ => None,
        }
    }

    /// True for transient failures worth a single retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(e) => e.is_timeout() || e.is_connect(),
            Self::EndpointError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
