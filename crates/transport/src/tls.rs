//! TLS client support built on rustls

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};

/// Load the CA certificates of a PEM trust store.
pub fn load_trust_store(path: &Path) -> Result<RootCertStore> {
    let file = File::open(path).map_err(|e| TransportError::trust_store(path, e))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader).map_err(|e| TransportError::trust_store(path, e))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(&certs[..]);
    if ignored > 0 {
        warn!(path = %path.display(), ignored, "skipped unparsable certificates in trust store");
    }
    if added == 0 {
        return Err(TransportError::trust_store(path, "no CA certificates found"));
    }

    debug!(path = %path.display(), added, "loaded trust store");
    Ok(roots)
}

/// Default client configuration trusting only `roots`.
pub fn client_config(roots: RootCertStore) -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Arc::new(config)
}

/// Run the TLS handshake over an established TCP stream.
///
/// `host` names the peer for certificate verification; IP literals are
/// checked against IP address SANs.
pub async fn handshake(
    config: Arc<ClientConfig>,
    host: &str,
    stream: TcpStream,
    peer: &str,
) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host)
        .map_err(|_| TransportError::connect_failed(peer, format!("invalid TLS server name '{host}'")))?;

    TlsConnector::from(config)
        .connect(server_name, stream)
        .await
        .map_err(|e| TransportError::connect_failed(peer, format!("TLS handshake failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sipprobe-{}-{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_trust_store() {
        let err = load_trust_store(Path::new("/nonexistent/sipprobe/ca.pem")).unwrap_err();
        assert!(matches!(err, TransportError::TrustStore { .. }));
    }

    #[test]
    fn test_trust_store_without_certificates() {
        let path = temp_file("empty.pem", "this is not a certificate\n");
        let err = load_trust_store(&path).unwrap_err();
        assert!(matches!(err, TransportError::TrustStore { .. }));
        assert!(err.to_string().contains("no CA certificates"));
        let _ = std::fs::remove_file(path);
    }
}
