//! Request rendering
//!
//! One pure function per message kind. Every message carries the same Via,
//! From, User-Agent and Allow headers; `Content-Length` is always computed by
//! [`MessageWriter::finish`] from the body actually appended, because the
//! response framing on the other side relies on it being exact.

use std::fmt;

use tracing::trace;

use crate::error::Result;
use crate::sdp;
use crate::types::{CallContext, SipMethod, Target};

/// User part of the probe's own SIP identity
pub const LOCAL_USER: &str = "99999";

/// From tag used on INVITE and ACK
pub const LOCAL_TAG: &str = "456";

/// From tag used on OPTIONS
pub const OPTIONS_TAG: &str = "5678";

/// Fixed Via branch parameter
pub const VIA_BRANCH: &str = "1234";

/// User-Agent header value
pub const USER_AGENT: &str = "SIP Probe";

/// Methods advertised in the Allow header
pub const ALLOW: &str = "INVITE,ACK,BYE,CANCEL,OPTIONS,INFO,MESSAGE,SUBSCRIBE,NOTIFY,PRACK,UPDATE,REFER";

/// Max-Forwards for INVITE and ACK
pub const INVITE_MAX_FORWARDS: u8 = 10;

/// Max-Forwards for OPTIONS: the probe targets the UA itself, never a downstream hop
pub const OPTIONS_MAX_FORWARDS: u8 = 0;

/// A request rendered to wire format, ready to hand to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    method: SipMethod,
    text: String,
}

impl RenderedMessage {
    pub fn method(&self) -> SipMethod {
        self.method
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns the bytes following the blank line that ends the headers.
    pub fn body(&self) -> &str {
        self.text
            .split_once("\r\n\r\n")
            .map(|(_, body)| body)
            .unwrap_or("")
    }

    /// Returns the value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let head = self.text.split("\r\n\r\n").next().unwrap_or("");
        head.split("\r\n").skip(1).find_map(|line| {
            let (header, value) = line.split_once(':')?;
            header
                .trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

impl fmt::Display for RenderedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<[u8]> for RenderedMessage {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Accumulates a start line and headers, then seals the message with its body.
struct MessageWriter {
    method: SipMethod,
    buf: String,
}

impl MessageWriter {
    fn request(method: SipMethod, request_uri: &str) -> Self {
        let mut buf = String::with_capacity(1024);
        buf.push_str(method.as_str());
        buf.push(' ');
        buf.push_str(request_uri);
        buf.push_str(" SIP/2.0\r\n");
        Self { method, buf }
    }

    fn header(mut self, name: &str, value: impl fmt::Display) -> Self {
        use fmt::Write;
        // Writing into a String cannot fail
        let _ = write!(self.buf, "{name}: {value}\r\n");
        self
    }

    fn finish(self, body: &str) -> RenderedMessage {
        let mut message = self.header("Content-Length", body.len());
        message.buf.push_str("\r\n");
        message.buf.push_str(body);
        trace!(method = %message.method, bytes = message.buf.len(), "rendered request");
        RenderedMessage {
            method: message.method,
            text: message.buf,
        }
    }
}

fn via(target: &Target, context: &CallContext) -> String {
    format!(
        "SIP/2.0/{} {}:{};branch={}",
        target.transport().via_transport(),
        context.source_ip(),
        target.port(),
        VIA_BRANCH
    )
}

fn contact(target: &Target, context: &CallContext) -> String {
    format!(
        "<sip:{}@{}:{};transport={}>",
        LOCAL_USER,
        context.source_ip(),
        target.port(),
        target.transport().uri_transport()
    )
}

fn dialog_call_id(context: &CallContext) -> String {
    format!("{}@{}", context.call_id(), context.source_ip())
}

/// Common INVITE header set; only the body differs between offer styles.
fn invite(target: &Target, context: &CallContext) -> Result<MessageWriter> {
    let (user, domain) = target.dialog_parts()?;
    let port = target.port();
    let request_uri = format!(
        "sip:{user}@{domain}:{port};transport={}",
        target.transport().uri_transport()
    );

    Ok(MessageWriter::request(SipMethod::Invite, &request_uri)
        .header("Via", via(target, context))
        .header("From", format_args!("<sip:{}@{}>;tag={}", LOCAL_USER, context.source_ip(), LOCAL_TAG))
        .header("To", format_args!("<sip:{user}@{domain}:{port}>"))
        .header("Call-ID", dialog_call_id(context))
        .header("CSeq", format_args!("{} INVITE", context.cseq()))
        .header("Contact", contact(target, context))
        .header("User-Agent", USER_AGENT)
        .header("Max-Forwards", INVITE_MAX_FORWARDS)
        .header("Supported", "replaces,timer")
        .header("P-Asserted-Identity", format_args!("<sip:{}@{}>", LOCAL_USER, context.source_ip()))
        .header("Allow", ALLOW)
        .header("Content-Type", "application/sdp"))
}

/// Render an INVITE carrying an SDP offer for `media_port`.
///
/// Fails with [`MessageError::InvalidTarget`](crate::MessageError::InvalidTarget)
/// when the target has no URI user or domain part.
pub fn early_offer_invite(
    target: &Target,
    context: &CallContext,
    media_port: u16,
) -> Result<RenderedMessage> {
    let offer = sdp::audio_offer(context.source_ip(), media_port);
    Ok(invite(target, context)?.finish(&offer))
}

/// Render a bodyless INVITE; the far end makes the offer in its 200 OK.
pub fn delayed_offer_invite(target: &Target, context: &CallContext) -> Result<RenderedMessage> {
    Ok(invite(target, context)?.finish(""))
}

/// Render an OPTIONS request addressed to the UA itself.
pub fn options(target: &Target, context: &CallContext) -> RenderedMessage {
    let host = target.host();
    let port = target.port();
    let request_uri = format!("sip:{host}:{port};transport={}", target.transport().uri_transport());

    MessageWriter::request(SipMethod::Options, &request_uri)
        .header("Via", via(target, context))
        .header(
            "From",
            format_args!("\"{}\"<sip:{}@{}:{}>;tag={}", USER_AGENT, LOCAL_USER, context.source_ip(), port, OPTIONS_TAG),
        )
        .header("To", format_args!("<sip:{host}:{port}>"))
        .header("Call-ID", context.call_id())
        .header("CSeq", format_args!("{} OPTIONS", context.cseq()))
        .header("User-Agent", USER_AGENT)
        .header("Allow", ALLOW)
        .header("Max-Forwards", OPTIONS_MAX_FORWARDS)
        .finish("")
}

/// Render the ACK for a 2xx response to the INVITE sent with `context`.
///
/// `response_tag` is the To tag the far end put on its 200 OK.
pub fn ack(target: &Target, context: &CallContext, response_tag: &str) -> Result<RenderedMessage> {
    let (user, domain) = target.dialog_parts()?;
    let port = target.port();
    let request_uri = format!("sip:{domain}:{port};transport={}", target.transport().uri_transport());

    Ok(MessageWriter::request(SipMethod::Ack, &request_uri)
        .header("Via", via(target, context))
        .header("From", format_args!("<sip:{}@{}>;tag={}", LOCAL_USER, context.source_ip(), LOCAL_TAG))
        .header("To", format_args!("<sip:{user}@{domain}:{port}>;tag={response_tag}"))
        .header("CSeq", format_args!("{} ACK", context.cseq()))
        .header("Call-ID", dialog_call_id(context))
        .header("Contact", contact(target, context))
        .header("User-Agent", USER_AGENT)
        .header("Allow", ALLOW)
        .header("Max-Forwards", INVITE_MAX_FORWARDS)
        .finish(""))
}
