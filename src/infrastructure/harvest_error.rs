//! Error taxonomy for a harvest run
//!
//! - [`FetchError`] is item-scoped: the item fails, the run continues.
//! - [`PersistenceError`] is fatal: without durable state the run must stop.
//! - [`HarvestError`] is what a whole run can fail with.

use std::path::PathBuf;
use thiserror::Error;

use super::parsing_error::ParsingError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("HTTP request failed with status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Redirected to login page {final_url} while fetching {url}")]
    AuthWall { url: String, final_url: String },

    #[error("Expected an image from {url} but got {content_type}")]
    UnexpectedContent { url: String, content_type: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Map a reqwest error onto the taxonomy.
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout { url: url.to_string() }
        } else if let Some(status) = error.status() {
            Self::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else if error.is_builder() {
            Self::InvalidUrl { url: url.to_string() }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Whether the response was a page standing in for the asset, so the
    /// unauthenticated alternate is worth one try
    pub fn warrants_alternate(&self) -> bool {
        matches!(self, Self::AuthWall { .. } | Self::UnexpectedContent { .. })
    }

    /// Check if a later attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::AuthWall { .. } | Self::UnexpectedContent { .. } | Self::InvalidUrl { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Input listing is unreadable: {reason}")]
    InputUnreadable { reason: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Configuration(#[from] ParsingError),
}

pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let server = FetchError::Status {
            status: 503,
            url: "https://example.com".to_string(),
        };
        let not_found = FetchError::Status {
            status: 404,
            url: "https://example.com".to_string(),
        };
        let wall = FetchError::AuthWall {
            url: "https://example.com/download".to_string(),
            final_url: "https://example.com/login".to_string(),
        };

        assert!(server.is_retryable());
        assert!(!not_found.is_retryable());
        assert!(!wall.is_retryable());
    }

    #[test]
    fn test_persistence_error_message_names_path() {
        let error = PersistenceError::io("/tmp/out/metadata.json", std::io::Error::other("disk full"));
        assert!(error.to_string().contains("/tmp/out/metadata.json"));
    }
}
