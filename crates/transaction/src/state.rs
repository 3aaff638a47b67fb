//! Transaction states and the per-transaction dialog state
//!
//! [`DialogState`] frames the response stream. Each response is a status
//! line, headers, a blank line and then exactly `Content-Length` body bytes;
//! the body is counted in raw bytes, terminators included, so the engine
//! knows the 200 OK is complete without waiting for the peer to close.

use std::fmt;

use tracing::debug;

use sipprobe_message::parser::trim_line_terminator;
use sipprobe_message::{parse_response_line, HeaderField, ParseError, ResponseLine};

use crate::error::{Result, TransactionError};

/// Where a transaction is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Idle,
    Connected,
    RequestSent,
    /// Reading responses to an INVITE
    AwaitingFinal,
    /// Reading the response to an OPTIONS
    OptionsAwaitingResponse,
    /// 200 OK fully received, ACK not yet sent
    DialogEstablished,
    AckSent,
    Closed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Idle => "Idle",
            TransactionState::Connected => "Connected",
            TransactionState::RequestSent => "RequestSent",
            TransactionState::AwaitingFinal => "AwaitingFinal",
            TransactionState::OptionsAwaitingResponse => "OptionsAwaitingResponse",
            TransactionState::DialogEstablished => "DialogEstablished",
            TransactionState::AckSent => "AckSent",
            TransactionState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// What the engine should do after feeding a chunk to [`DialogState::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Keep reading
    Continue,
    /// The 200 OK and its whole body have arrived; send the ACK
    Established,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Between responses, expecting a status line
    Start,
    Headers,
    Body { remaining: usize },
}

/// Mutable state of one INVITE transaction's response stream.
///
/// Created fresh for every transaction and dropped with it.
#[derive(Debug, Clone)]
pub struct DialogState {
    ok_received: bool,
    response_tag: Option<String>,
    ack_sent: bool,
    content_length: usize,
    body_read: usize,
    last_status: Option<u16>,
    section: Section,
}

impl DialogState {
    pub fn new() -> Self {
        Self {
            ok_received: false,
            response_tag: None,
            ack_sent: false,
            content_length: 0,
            body_read: 0,
            last_status: None,
            section: Section::Start,
        }
    }

    /// True once a `200` status line has been seen in the current response
    pub fn ok_received(&self) -> bool {
        self.ok_received
    }

    /// The To tag of the 200 OK, once seen
    pub fn response_tag(&self) -> Option<&str> {
        self.response_tag.as_deref()
    }

    pub fn ack_sent(&self) -> bool {
        self.ack_sent
    }

    /// Content-Length declared by the current response
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Body bytes of the current response consumed so far
    pub fn body_read(&self) -> usize {
        self.body_read
    }

    /// Status code of the most recent status line
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// Bytes left in the current body, or `None` while reading headers.
    ///
    /// The engine uses this to bound its next read so it never swallows the
    /// start of the following response.
    pub fn body_remaining(&self) -> Option<usize> {
        match self.section {
            Section::Body { remaining } => Some(remaining),
            _ => None,
        }
    }

    pub fn mark_ack_sent(&mut self) {
        self.ack_sent = true;
    }

    /// Feed one chunk as returned by the connection (terminator included).
    pub fn observe(&mut self, raw: &[u8]) -> Result<Progress> {
        if self.ack_sent {
            return Ok(Progress::Continue);
        }

        if let Section::Body { remaining } = self.section {
            return Ok(self.consume_body(raw.len(), remaining));
        }

        let text = String::from_utf8_lossy(raw);
        let line = trim_line_terminator(&text);
        let parsed = match parse_response_line(line) {
            Ok(parsed) => parsed,
            // Framing depends on the length, so a bad one cannot be skipped
            Err(e @ ParseError::InvalidContentLength { .. }) => {
                return Err(TransactionError::from_parse(line, e));
            }
            Err(e) => {
                debug!(%line, error = %e, "passing through unrecognised line");
                return Ok(Progress::Continue);
            }
        };

        match parsed {
            ResponseLine::Status(status) => {
                self.section = Section::Headers;
                self.ok_received = status.is_ok();
                self.last_status = Some(status.code);
                self.content_length = 0;
                self.body_read = 0;
                debug!(code = status.code, reason = %status.reason, "response started");
            }
            ResponseLine::Header(HeaderField::To { tag }) if self.ok_received => {
                let tag = tag.ok_or_else(|| TransactionError::malformed(line, "To header of 200 OK has no tag"))?;
                if self.response_tag.is_none() {
                    debug!(%tag, "captured response tag");
                    self.response_tag = Some(tag);
                }
            }
            ResponseLine::Header(HeaderField::ContentLength(length)) => {
                self.content_length = length;
            }
            ResponseLine::Blank if self.section == Section::Headers => {
                return Ok(self.end_of_headers());
            }
            ResponseLine::Blank => {
                // Keep-alive CRLF between responses
            }
            ResponseLine::Header(_) | ResponseLine::Continuation(_) => {}
        }

        Ok(Progress::Continue)
    }

    fn end_of_headers(&mut self) -> Progress {
        if self.content_length == 0 {
            self.section = Section::Start;
            return self.complete();
        }
        debug!(content_length = self.content_length, "reading body");
        self.section = Section::Body {
            remaining: self.content_length,
        };
        Progress::Continue
    }

    fn consume_body(&mut self, len: usize, remaining: usize) -> Progress {
        let taken = len.min(remaining);
        self.body_read += taken;
        let remaining = remaining - taken;

        if remaining > 0 {
            self.section = Section::Body { remaining };
            return Progress::Continue;
        }

        self.section = Section::Start;
        self.complete()
    }

    /// A response just ended; only a 200 OK establishes the dialog.
    fn complete(&mut self) -> Progress {
        if self.ok_received {
            Progress::Established
        } else {
            Progress::Continue
        }
    }
}

impl Default for DialogState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(state: &mut DialogState, lines: &[&str]) -> Vec<Progress> {
        lines
            .iter()
            .map(|line| state.observe(line.as_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_200_ok_with_body_is_established_after_last_body_byte() {
        let body = "v=0\r\ns=-\r\n";
        let mut state = DialogState::new();

        let length = format!("Content-Length: {}\r\n", body.len());
        let progress = feed(
            &mut state,
            &[
                "SIP/2.0 200 OK\r\n",
                "To: <sip:1@192.0.2.10>;tag=ABC123\r\n",
                length.as_str(),
                "\r\n",
                "v=0\r\n",
            ],
        );
        assert!(progress.iter().all(|p| *p == Progress::Continue));
        assert_eq!(state.body_remaining(), Some(5));
        assert_eq!(state.response_tag(), Some("ABC123"));

        assert_eq!(state.observe(b"s=-\r\n").unwrap(), Progress::Established);
        assert_eq!(state.body_read(), body.len());
        assert_eq!(state.content_length(), body.len());
    }

    #[test]
    fn test_provisional_responses_never_establish() {
        let mut state = DialogState::new();
        let progress = feed(
            &mut state,
            &[
                "SIP/2.0 100 Trying\r\n",
                "To: <sip:1@192.0.2.10>\r\n",
                "Content-Length: 0\r\n",
                "\r\n",
                "SIP/2.0 180 Ringing\r\n",
                "To: <sip:1@192.0.2.10>;tag=early\r\n",
                "Content-Length: 0\r\n",
                "\r\n",
            ],
        );
        assert!(progress.iter().all(|p| *p == Progress::Continue));
        assert!(!state.ok_received());
        assert_eq!(state.response_tag(), None);
        assert_eq!(state.last_status(), Some(180));
    }

    #[test]
    fn test_provisional_body_is_skipped_not_parsed() {
        let mut state = DialogState::new();
        feed(
            &mut state,
            &["SIP/2.0 183 Session Progress\r\n", "Content-Length: 20\r\n", "\r\n"],
        );

        // Body bytes that look like headers must not be interpreted
        assert_eq!(state.observe(b"SIP/2.0 200 OK\r\n").unwrap(), Progress::Continue);
        assert!(!state.ok_received());
        assert_eq!(state.observe(b"To:\r\n").unwrap(), Progress::Continue);
        assert_eq!(state.body_remaining(), None);
        assert_eq!(state.last_status(), Some(183));
    }

    #[test]
    fn test_zero_length_200_is_established_at_blank_line() {
        let mut state = DialogState::new();
        let progress = feed(
            &mut state,
            &["SIP/2.0 200 OK\r\n", "t: <sip:1@x>;tag=zz\r\n", "l: 0\r\n", "\r\n"],
        );
        assert_eq!(progress.last(), Some(&Progress::Established));
        assert_eq!(state.response_tag(), Some("zz"));
    }

    #[test]
    fn test_to_without_tag_on_200_is_malformed() {
        let mut state = DialogState::new();
        state.observe(b"SIP/2.0 200 OK\r\n").unwrap();
        let err = state.observe(b"To: <sip:1@192.0.2.10>\r\n").unwrap_err();
        assert!(matches!(err, TransactionError::MalformedResponse { .. }));
    }

    #[test]
    fn test_non_numeric_content_length_is_malformed() {
        let mut state = DialogState::new();
        state.observe(b"SIP/2.0 200 OK\r\n").unwrap();
        let err = state.observe(b"Content-Length: twelve\r\n").unwrap_err();
        match err {
            TransactionError::MalformedResponse { line, .. } => assert_eq!(line, "Content-Length: twelve"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unrecognised_lines_pass_through() {
        let mut state = DialogState::new();
        let progress = feed(
            &mut state,
            &[
                "SIP/2.0 100 Trying\r\n",
                "X-Vendor-Garbage\r\n",
                "SIP/2.0 1xx Weird\r\n",
                "Content-Length: 0\r\n",
                "\r\n",
                "SIP/2.0 200 OK\r\n",
                "no colon here either\r\n",
                "To: <sip:1@192.0.2.10>;tag=ok1\r\n",
                "Content-Length: 0\r\n",
                "\r\n",
            ],
        );
        assert_eq!(progress.last(), Some(&Progress::Established));
        assert_eq!(state.response_tag(), Some("ok1"));
        assert_eq!(state.last_status(), Some(200));
    }

    #[test]
    fn test_nothing_is_observed_after_ack() {
        let mut state = DialogState::new();
        state.mark_ack_sent();
        assert_eq!(state.observe(b"Content-Length: bogus\r\n").unwrap(), Progress::Continue);
        assert!(state.ack_sent());
    }
}
