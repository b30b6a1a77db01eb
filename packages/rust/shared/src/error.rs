//! Error types for gransk.
//!
//! Library crates use [`GranskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum GranskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Connection to, or transport with, the extraction service failed.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input that could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Snapshot database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A name from untrusted input could not be turned into a safe relative path.
    #[error("unsafe path {name:?}: {reason}")]
    UnsafePath { name: String, reason: String },

    /// A plugin failed while handling a document.
    #[error("plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },

    /// A service does not implement the requested query.
    #[error("service {service} does not support {operation}")]
    Unsupported { service: String, operation: String },

    /// The pipeline was stopped and no longer accepts work.
    #[error("pipeline is stopped")]
    Stopped,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GranskError>;

impl GranskError {
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

    /// Reject an untrusted name.
    pub fn unsafe_path(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsafePath {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Attribute a failure to a named plugin.
    pub fn plugin(plugin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: msg.into(),
        }
    }

    /// A service was asked for a query it does not answer.
    pub fn unsupported(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            service: service.into(),
            operation: operation.into(),
        }
    }
}
