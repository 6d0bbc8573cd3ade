//! Error types for configuration and sinks.
//!
//! Neither of these ever reaches the HTTP exchange: configuration errors are reported
//! to whoever builds the layer, and sink errors are absorbed by [`crate::MultiSink`].

use std::path::PathBuf;

/// Errors produced while interpreting a [`crate::ZlogConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid byte size '{input}': {reason}")]
    InvalidByteSize { input: String, reason: String },

    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors produced by a [`crate::LogSink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink is closed")]
    Closed,
}
