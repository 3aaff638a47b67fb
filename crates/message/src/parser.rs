//! Tokenizing parser for SIP response lines
//!
//! The engine reads a response one line at a time, so this parser works on
//! single lines and only types the fields the probe acts on: the status line,
//! the `To` tag and `Content-Length`. Everything else comes back as
//! [`HeaderField::Other`].

use crate::error::ParseError;

/// A parsed `SIP/2.0 <code> <reason>` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    /// True for `200`, the only final response the probe acknowledges
    pub fn is_ok(&self) -> bool {
        self.code == 200
    }

    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.code)
    }
}

/// A header line, typed where the engine needs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderField {
    /// `To` (or compact `t`), with its first `tag` parameter if present
    To { tag: Option<String> },
    /// `Content-Length` (or compact `l`)
    ContentLength(usize),
    Other { name: String, value: String },
}

/// One line of a response stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    Status(StatusLine),
    Header(HeaderField),
    /// A folded header continuation (line starting with whitespace)
    Continuation(String),
    /// The empty line separating headers from the body
    Blank,
}

/// Parse a single response line. Trailing CR/LF bytes are ignored.
pub fn parse_response_line(line: &str) -> Result<ResponseLine, ParseError> {
    let line = trim_line_terminator(line);

    if line.is_empty() {
        return Ok(ResponseLine::Blank);
    }
    if line.starts_with("SIP/") {
        return parse_status_line(line).map(ResponseLine::Status);
    }
    if line.starts_with(' ') || line.starts_with('\t') {
        return Ok(ResponseLine::Continuation(line.trim().to_string()));
    }

    parse_header(line).map(ResponseLine::Header)
}

/// Strip one trailing `\n` and any `\r` before it.
pub fn trim_line_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.trim_end_matches('\r')
}

fn parse_status_line(line: &str) -> Result<StatusLine, ParseError> {
    let invalid = || ParseError::InvalidStatusLine {
        line: line.to_string(),
    };

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(invalid)?;
    let code = parts
        .next()
        .filter(|code| code.len() == 3)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(invalid)?;
    let reason = parts.next().unwrap_or("").trim();

    Ok(StatusLine {
        version: version.to_string(),
        code,
        reason: reason.to_string(),
    })
}

fn parse_header(line: &str) -> Result<HeaderField, ParseError> {
    let (name, value) = line.split_once(':').ok_or_else(|| ParseError::InvalidHeader {
        line: line.to_string(),
    })?;
    let name = name.trim();
    let value = value.trim();

    if name.is_empty() {
        return Err(ParseError::InvalidHeader {
            line: line.to_string(),
        });
    }

    if name.eq_ignore_ascii_case("To") || name.eq_ignore_ascii_case("t") {
        return Ok(HeaderField::To {
            tag: header_param(value, "tag"),
        });
    }

    if name.eq_ignore_ascii_case("Content-Length") || name.eq_ignore_ascii_case("l") {
        let length = value
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength {
                value: value.to_string(),
            })?;
        return Ok(HeaderField::ContentLength(length));
    }

    Ok(HeaderField::Other {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Find a header parameter in a name-addr or addr-spec value.
///
/// With `<...>` the parameters follow the closing bracket; without brackets
/// everything after the first `;` is a header parameter.
fn header_param(value: &str, wanted: &str) -> Option<String> {
    let params = match value.find('<') {
        Some(open) => {
            let close = value[open..].find('>')? + open;
            &value[close + 1..]
        }
        None => value.split_once(';').map(|(_, params)| params).unwrap_or(""),
    };

    params
        .split(';')
        .filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            Some((name.trim(), value.trim()))
        })
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
