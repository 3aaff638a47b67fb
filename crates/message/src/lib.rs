//! SIP message layer for the sipprobe tool
//!
//! This crate renders the handful of SIP requests the probe sends
//! (early-offer INVITE, delayed-offer INVITE, OPTIONS and the ACK that
//! completes an INVITE exchange) and parses the response lines that come back.
//!
//! Rendering is pure: every function takes the addressing and call parameters
//! explicitly and returns a [`RenderedMessage`]. Randomness (call identifiers,
//! media ports) lives in [`CallContext::new`] and [`random_media_port`] so
//! that two renders with identical inputs produce identical bytes.
//!
//! # Example
//!
//! ```
//! use sipprobe_message::{builder, CallContext, Target};
//!
//! let target = Target::new("192.0.2.10").with_user("1").with_domain("192.0.2.10");
//! let context = CallContext::new("192.0.2.55").with_call_id("12345");
//!
//! let invite = builder::early_offer_invite(&target, &context, 40000).unwrap();
//! assert!(invite.as_str().starts_with("INVITE sip:1@192.0.2.10:5060;transport=tcp SIP/2.0\r\n"));
//! ```

pub mod builder;
pub mod error;
pub mod parser;
pub mod sdp;
pub mod types;

pub use builder::RenderedMessage;
pub use error::{MessageError, ParseError, Result};
pub use parser::{parse_response_line, HeaderField, ResponseLine, StatusLine};
pub use types::{
    generate_call_id, random_media_port, CallContext, ProbeMode, SipMethod, Target,
    TransportMode, DEFAULT_PLAIN_PORT, DEFAULT_TLS_PORT, MEDIA_PORT_MAX, MEDIA_PORT_MIN,
};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        builder, parse_response_line, CallContext, HeaderField, MessageError, ParseError,
        ProbeMode, RenderedMessage, ResponseLine, SipMethod, StatusLine, Target, TransportMode,
    };
}
