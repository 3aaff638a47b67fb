//! Transport selection: plain TCP on 5060 or TLS on 5061

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info, warn};

use sipprobe_message::{Target, TransportMode};

use crate::connection::Connection;
use crate::error::{Result, TransportError};

/// Opens connections to a target.
///
/// The transaction engine only talks to this trait, which lets tests hand it
/// in-memory streams instead of sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `target`. No retries are attempted.
    async fn open(&self, target: &Target) -> Result<Connection>;
}

/// The default connector: picks TCP or TLS from the target's transport mode
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportSelector;

impl TransportSelector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TransportSelector {
    async fn open(&self, target: &Target) -> Result<Connection> {
        let peer = format!("{}:{}", target.host(), target.port());

        match target.transport() {
            TransportMode::Plain => {
                let stream = connect_tcp(target.host(), target.port()).await?;
                info!(%peer, "connected (tcp)");
                Ok(Connection::new(stream, peer))
            }
            TransportMode::Tls { trust_store } => open_tls(target, trust_store, peer).await,
        }
    }
}

/// Open a connection with the default [`TransportSelector`]
pub async fn open(target: &Target) -> Result<Connection> {
    TransportSelector.open(target).await
}

#[cfg(feature = "tls")]
async fn open_tls(target: &Target, trust_store: &std::path::Path, peer: String) -> Result<Connection> {
    // Load the trust store first so a bad path fails before any packet is sent
    let roots = crate::tls::load_trust_store(trust_store)?;
    let config = crate::tls::client_config(roots);

    let tcp = connect_tcp(target.host(), target.port()).await?;
    let stream = crate::tls::handshake(config, target.host(), tcp, &peer).await?;
    info!(%peer, "connected (tls)");
    Ok(Connection::new(stream, peer))
}

#[cfg(not(feature = "tls"))]
async fn open_tls(_target: &Target, _trust_store: &std::path::Path, _peer: String) -> Result<Connection> {
    Err(TransportError::TlsUnavailable)
}

/// Resolve `host` and connect to the first address that accepts.
pub async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let addrs = resolve(host, port).await?;

    let mut last_error = None;
    for addr in &addrs {
        debug!(%addr, "connecting");
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(%addr, error = %e, "could not disable Nagle's algorithm");
                }
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no address to connect to".to_string());
    Err(TransportError::connect_failed(format!("{host}:{port}"), reason))
}

async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let unresolved = |source| TransportError::HostUnresolved {
        host: host.to_string(),
        source,
    };

    let addrs: Vec<SocketAddr> = lookup_host((host, port)).await.map_err(unresolved)?.collect();
    if addrs.is_empty() {
        return Err(unresolved(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses returned",
        )));
    }
    Ok(addrs)
}
