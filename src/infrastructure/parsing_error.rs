//! Parsing configuration errors
//!
//! Raised only while compiling selector and pattern configuration. Extraction
//! against a document never errors: a field that cannot be found is simply
//! absent.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid pattern for {name}: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("No valid selectors compiled for {field}: {errors}")]
    NoValidSelectors { field: String, errors: String },
}

impl ParsingError {
    /// Create an invalid selector error
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(name: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
