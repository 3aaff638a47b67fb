//! Stream transports for the sipprobe tool
//!
//! Opens the single connection a probe transaction runs over: plain TCP to
//! port 5060 or TLS to port 5061, depending on the [`Target`]'s transport
//! mode. The result is a [`Connection`] with a line-oriented read side and a
//! flushing write side.
//!
//! [`Target`]: sipprobe_message::Target

pub mod connection;
pub mod error;
pub mod selector;
#[cfg(feature = "tls")]
pub mod tls;

pub use connection::{AsyncStream, Connection, MAX_LINE_LENGTH};
pub use error::{Result, TransportError};
pub use selector::{connect_tcp, open, Connector, TransportSelector};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{open, Connection, Connector, Result, TransportError, TransportSelector};
}
