//! Error types for message rendering and response parsing

use thiserror::Error;

/// Result type for message rendering
pub type Result<T> = std::result::Result<T, MessageError>;

/// Errors raised while preparing a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The target lacks a field the requested message needs
    #[error("Invalid target: {reason}")]
    InvalidTarget { reason: String },

    /// A probe mode string that is not early, delayed or options
    #[error("Unknown probe mode '{mode}': expected \"early\", \"delayed\" or \"options\"")]
    UnknownMode { mode: String },
}

impl MessageError {
    /// Create an invalid target error
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            reason: reason.into(),
        }
    }
}

/// Errors raised while tokenizing a response line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A line starting with `SIP/` whose status code is missing or not numeric
    #[error("Invalid status line: {line}")]
    InvalidStatusLine { line: String },

    /// A header line without a `name: value` separator
    #[error("Invalid header line: {line}")]
    InvalidHeader { line: String },

    /// A Content-Length header whose value is not a non-negative integer
    #[error("Invalid Content-Length value '{value}'")]
    InvalidContentLength { value: String },
}
