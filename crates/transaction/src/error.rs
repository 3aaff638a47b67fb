//! Transaction error types

use thiserror::Error;

use sipprobe_message::{MessageError, ParseError};
use sipprobe_transport::TransportError;

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Errors that end a probe transaction.
///
/// Every variant is terminal for the transaction; the connection is closed
/// before the error is returned.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Connecting, reading or writing failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be rendered for this target
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// The peer sent something the engine cannot act on
    #[error("Malformed response ({reason}): {line}")]
    MalformedResponse { line: String, reason: String },
}

impl TransactionError {
    /// Create a malformed response error
    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a parse failure together with the offending line
    pub fn from_parse(line: impl Into<String>, error: ParseError) -> Self {
        Self::malformed(line, error.to_string())
    }

    /// True when the peer could not be reached at all
    pub fn is_connect_error(&self) -> bool {
        matches!(self, TransactionError::Transport(e) if e.is_connect_error())
    }
}
