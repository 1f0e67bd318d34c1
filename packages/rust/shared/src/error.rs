//! Error types for contribmerge.
//!
//! Library crates use [`ContribMergeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all contribmerge operations.
#[derive(Debug, thiserror::Error)]
pub enum ContribMergeError {
    /// Missing credential or unreadable configuration. Fatal.
    #[error("config error: {message}")]
    Config { message: String },

    /// Contribution retrieval from the remote service failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Description generation failed for one repository.
    #[error("generation error: {0}")]
    Generation(String),

    /// The document has no place to put a category.
    #[error("section error for '{category}': {message}")]
    Section { category: String, message: String },

    /// Filesystem I/O error on the target document or config.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed input (entry sets, API payloads).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContribMergeError>;

impl ContribMergeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a section error for the given category.
    pub fn section(category: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Section {
            category: category.into(),
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
