//! Error types for SupportBridge.
//!
//! Library crates use [`SupportBridgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-record problems (missing fields, bad timestamps, orphaned
//! conversations) are never errors: they degrade to defaults inside the
//! pipeline. Only stage-level failures surface here.

use std::path::PathBuf;

/// Top-level error type for all SupportBridge operations.
#[derive(Debug, thiserror::Error)]
pub enum SupportBridgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A stage input document is not valid JSON or has the wrong shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A required stage input does not exist on disk.
    #[error("missing input {path:?}: run the previous stage first")]
    MissingInput { path: PathBuf },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad run date, unknown source, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SupportBridgeError>;

impl SupportBridgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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
