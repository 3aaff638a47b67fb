//! Transport error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised while opening, using or closing a connection.
///
/// None of these are retried: each one ends the transaction that hit it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Name lookup failed or returned no address
    #[error("Could not resolve host {host}: {source}")]
    HostUnresolved {
        host: String,
        #[source]
        source: io::Error,
    },

    /// TCP connect refused or unreachable, or the TLS handshake failed
    #[error("Failed to connect to {peer}: {reason}")]
    ConnectFailed { peer: String, reason: String },

    /// The trust store could not be read or holds no usable certificate
    #[error("Invalid trust store {}: {reason}", path.display())]
    TrustStore { path: PathBuf, reason: String },

    /// TLS was requested but this build has no TLS support
    #[error("TLS transport is not available in this build")]
    TlsUnavailable,

    #[error("Write to {peer} failed: {source}")]
    WriteFailed {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("Read from {peer} failed: {source}")]
    ReadFailed {
        peer: String,
        #[source]
        source: io::Error,
    },

    /// The peer sent a line longer than the reader accepts
    #[error("Line from {peer} exceeds {limit} bytes without a newline")]
    LineTooLong { peer: String, limit: usize },

    /// Shutting down the write side failed; the socket is released regardless
    #[error("Closing connection to {peer} failed: {source}")]
    CloseFailed {
        peer: String,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Create a connect failure
    pub fn connect_failed(peer: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a trust store error
    pub fn trust_store(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::TrustStore {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that happened before any byte was sent
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            TransportError::HostUnresolved { .. }
                | TransportError::ConnectFailed { .. }
                | TransportError::TrustStore { .. }
                | TransportError::TlsUnavailable
        )
    }
}
