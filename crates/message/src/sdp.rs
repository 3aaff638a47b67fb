//! SDP offer carried by the early-offer INVITE
//!
//! A single audio stream: G.711 A-law (payload 8) plus RFC 4733
//! telephone-event (payload 101), 20 ms packetization, send and receive.

const SESSION_ID: &str = "12345";
const SESSION_VERSION: &str = "12345";

/// Render the audio offer for a session originating at `connection_ip`.
pub fn audio_offer(connection_ip: &str, media_port: u16) -> String {
    let family = address_family(connection_ip);
    let lines = [
        "v=0".to_string(),
        format!("o=SP {SESSION_ID} {SESSION_VERSION} IN {family} {connection_ip}"),
        "s=-".to_string(),
        format!("c=IN {family} {connection_ip}"),
        "t=0 0".to_string(),
        format!("m=audio {media_port} RTP/AVP 8 101"),
        "a=rtpmap:8 PCMA/8000".to_string(),
        "a=rtpmap:101 telephone-event/8000".to_string(),
        "a=fmtp:101 0-15".to_string(),
        "a=ptime:20".to_string(),
        "a=sendrecv".to_string(),
    ];

    let mut body = String::with_capacity(256);
    for line in &lines {
        body.push_str(line);
        body.push_str("\r\n");
    }
    body
}

fn address_family(address: &str) -> &'static str {
    if address.contains(':') {
        "IP6"
    } else {
        "IP4"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_describes_single_pcma_stream() {
        let sdp = audio_offer("192.0.2.55", 40000);

        assert!(sdp.starts_with("v=0\r\n"));
        assert!(sdp.contains("c=IN IP4 192.0.2.55\r\n"));
        assert!(sdp.contains("m=audio 40000 RTP/AVP 8 101\r\n"));
        assert!(sdp.contains("a=rtpmap:8 PCMA/8000\r\n"));
        assert!(sdp.contains("a=rtpmap:101 telephone-event/8000\r\n"));
        assert_eq!(sdp.matches("m=").count(), 1);
        assert!(sdp.ends_with("a=sendrecv\r\n"));
    }

    #[test]
    fn test_ipv6_source_uses_ip6_address_type() {
        let sdp = audio_offer("2001:db8::55", 2000);
        assert!(sdp.contains("c=IN IP6 2001:db8::55\r\n"));
        assert!(sdp.contains("IN IP6 2001:db8::55\r\n"));
    }
}
