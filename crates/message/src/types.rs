//! Addressing and call parameters shared by the builder, transport and engine

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::Rng;

use crate::error::{MessageError, Result};

/// Well-known port for SIP over TCP
pub const DEFAULT_PLAIN_PORT: u16 = 5060;

/// Well-known port for SIP over TLS
pub const DEFAULT_TLS_PORT: u16 = 5061;

/// Lowest media port offered in SDP (inclusive)
pub const MEDIA_PORT_MIN: u16 = 1024;

/// Upper bound for offered media ports (exclusive)
pub const MEDIA_PORT_MAX: u16 = 65535;

/// Which request the probe sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeMode {
    /// INVITE carrying an SDP offer
    EarlyOffer,
    /// INVITE without a body; the offer arrives in the 200 OK
    DelayedOffer,
    /// OPTIONS reachability probe
    Options,
}

impl ProbeMode {
    /// Returns the command-line name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMode::EarlyOffer => "early",
            ProbeMode::DelayedOffer => "delayed",
            ProbeMode::Options => "options",
        }
    }

    /// Returns true for the INVITE modes, which establish a dialog and need an ACK.
    pub fn is_invite(&self) -> bool {
        matches!(self, ProbeMode::EarlyOffer | ProbeMode::DelayedOffer)
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeMode {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "early" => Ok(ProbeMode::EarlyOffer),
            "delayed" => Ok(ProbeMode::DelayedOffer),
            "options" => Ok(ProbeMode::Options),
            _ => Err(MessageError::UnknownMode { mode: s.to_string() }),
        }
    }
}

/// SIP methods the probe renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SipMethod {
    Invite,
    Ack,
    Options,
}

impl SipMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SipMethod::Invite => "INVITE",
            SipMethod::Ack => "ACK",
            SipMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for SipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream transport used to reach the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMode {
    /// Plain TCP
    Plain,
    /// TLS, verifying the peer against the CA certificates in `trust_store`
    Tls { trust_store: PathBuf },
}

impl TransportMode {
    /// Returns the well-known port for this transport.
    pub fn default_port(&self) -> u16 {
        match self {
            TransportMode::Plain => DEFAULT_PLAIN_PORT,
            TransportMode::Tls { .. } => DEFAULT_TLS_PORT,
        }
    }

    /// Returns the Via header transport token.
    pub fn via_transport(&self) -> &'static str {
        match self {
            TransportMode::Plain => "TCP",
            TransportMode::Tls { .. } => "TLS",
        }
    }

    /// Returns the value of the URI `transport` parameter.
    pub fn uri_transport(&self) -> &'static str {
        match self {
            TransportMode::Plain => "tcp",
            TransportMode::Tls { .. } => "tls",
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, TransportMode::Tls { .. })
    }

    /// Returns the trust store path for TLS, `None` for plain TCP.
    pub fn trust_store(&self) -> Option<&Path> {
        match self {
            TransportMode::Plain => None,
            TransportMode::Tls { trust_store } => Some(trust_store),
        }
    }
}

/// The far end of a probe.
///
/// `host` is where the connection goes (the UA). The URI user and domain
/// parts are only needed for the INVITE modes; OPTIONS addresses the UA
/// directly. The port follows the transport unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    user: Option<String>,
    domain: Option<String>,
    transport: TransportMode,
    port: Option<u16>,
}

impl Target {
    /// Create a plain TCP target for `host`
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            domain: None,
            transport: TransportMode::Plain,
            port: None,
        }
    }

    /// Set the URI user part (the part preceding the '@')
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the URI domain part
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Switch to TLS with the given trust store
    pub fn with_tls(mut self, trust_store: impl Into<PathBuf>) -> Self {
        self.transport = TransportMode::Tls {
            trust_store: trust_store.into(),
        };
        self
    }

    /// Override the well-known port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn transport(&self) -> &TransportMode {
        &self.transport
    }

    /// Port the connection goes to and the messages advertise.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.transport.default_port())
    }

    /// Returns the (user, domain) pair required by INVITE and ACK.
    pub(crate) fn dialog_parts(&self) -> Result<(&str, &str)> {
        let user = non_empty(self.user.as_deref())
            .ok_or_else(|| MessageError::invalid_target("URI user part is required for INVITE"))?;
        let domain = non_empty(self.domain.as_deref())
            .ok_or_else(|| MessageError::invalid_target("URI domain part is required for INVITE"))?;
        Ok((user, domain))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Per-call identifiers: source address, Call-ID and CSeq.
///
/// The call identifier is generated once; clones share it, so a retried
/// request keeps the same Call-ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    source_ip: String,
    call_id: String,
    cseq: u32,
}

impl CallContext {
    /// Create a context with a fresh random call identifier and CSeq 1
    pub fn new(source_ip: impl Into<String>) -> Self {
        Self {
            source_ip: source_ip.into(),
            call_id: generate_call_id(),
            cseq: 1,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }

    pub fn with_cseq(mut self, cseq: u32) -> Self {
        self.cseq = cseq;
        self
    }

    pub fn source_ip(&self) -> &str {
        &self.source_ip
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn cseq(&self) -> u32 {
        self.cseq
    }
}

/// Random five digit decimal call identifier
pub fn generate_call_id() -> String {
    rand::thread_rng().gen_range(10000..=99999u32).to_string()
}

/// Random media port in `[MEDIA_PORT_MIN, MEDIA_PORT_MAX)`
pub fn random_media_port() -> u16 {
    rand::thread_rng().gen_range(MEDIA_PORT_MIN..MEDIA_PORT_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_mode_parsing_is_case_insensitive() {
        assert_eq!("early".parse::<ProbeMode>().unwrap(), ProbeMode::EarlyOffer);
        assert_eq!("Delayed".parse::<ProbeMode>().unwrap(), ProbeMode::DelayedOffer);
        assert_eq!(" OPTIONS ".parse::<ProbeMode>().unwrap(), ProbeMode::Options);

        let err = "register".parse::<ProbeMode>().unwrap_err();
        assert!(matches!(err, MessageError::UnknownMode { .. }));
    }

    #[test]
    fn test_target_ports_follow_transport() {
        let plain = Target::new("192.0.2.10");
        assert_eq!(plain.port(), 5060);
        assert_eq!(plain.transport().via_transport(), "TCP");

        let tls = Target::new("192.0.2.10").with_tls("/etc/ssl/ca.pem");
        assert_eq!(tls.port(), 5061);
        assert_eq!(tls.transport().uri_transport(), "tls");
        assert_eq!(tls.transport().trust_store(), Some(Path::new("/etc/ssl/ca.pem")));

        let custom = tls.with_port(15061);
        assert_eq!(custom.port(), 15061);
    }

    #[test]
    fn test_dialog_parts_require_user_and_domain() {
        let target = Target::new("192.0.2.10");
        assert!(target.dialog_parts().is_err());

        let target = target.with_user("1");
        assert!(target.dialog_parts().is_err());

        let target = target.with_domain("example.com");
        assert_eq!(target.dialog_parts().unwrap(), ("1", "example.com"));

        let blank = Target::new("192.0.2.10").with_user(" ").with_domain("example.com");
        assert!(blank.dialog_parts().is_err());
    }

    #[test]
    fn test_call_id_is_five_digits_and_shared_by_clones() {
        for _ in 0..200 {
            let id = generate_call_id();
            assert_eq!(id.len(), 5);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
        }

        let context = CallContext::new("192.0.2.55");
        let retry = context.clone();
        assert_eq!(context.call_id(), retry.call_id());
        assert_eq!(context.cseq(), 1);
    }
}
