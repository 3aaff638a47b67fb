//! Listen command - print what a single TCP peer sends

use std::io::Write;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use sipprobe_message::parser::trim_line_terminator;
use sipprobe_transport::Connection;

/// Execute the listen command
pub async fn execute(bind: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("could not listen on {bind}:{port}"))?;
    info!(addr = %listener.local_addr()?, "waiting for one connection");

    let lines = serve_one(&listener, &mut std::io::stdout()).await?;
    info!(lines, "peer closed the connection");
    Ok(())
}

/// Accept a single connection and print its lines to `out` until the peer closes
pub async fn serve_one<W: Write>(listener: &TcpListener, out: &mut W) -> Result<usize> {
    let (stream, peer) = listener.accept().await.context("accept failed")?;
    info!(%peer, "accepted connection");

    let mut connection = Connection::new(stream, peer.to_string());
    let printed = print_lines(&mut connection, out).await;

    if let Err(e) = connection.close().await {
        warn!(error = %e, "failed to close connection cleanly");
    }
    printed
}

/// Print every received line, without its terminator, until end of stream
pub async fn print_lines<W: Write>(connection: &mut Connection, out: &mut W) -> Result<usize> {
    let mut count = 0;
    while let Some(raw) = connection.read_line().await? {
        let text = String::from_utf8_lossy(&raw);
        writeln!(out, "{}", trim_line_terminator(&text))?;
        out.flush()?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_print_lines_until_close() {
        let (client, mut peer) = duplex(4096);
        peer.write_all(b"INVITE sip:1@x SIP/2.0\r\nContent-Length: 0\r\n\r\ntrailing")
            .await
            .unwrap();
        peer.shutdown().await.unwrap();

        let mut connection = Connection::new(client, "test");
        let mut out = Vec::new();
        let count = print_lines(&mut connection, &mut out).await.unwrap();

        assert_eq!(count, 4);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "INVITE sip:1@x SIP/2.0\nContent-Length: 0\n\ntrailing\n"
        );
    }

    #[tokio::test]
    async fn test_serve_one_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"OPTIONS sip:x SIP/2.0\r\nMax-Forwards: 0\r\n").await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let mut out = Vec::new();
        let count = serve_one(&listener, &mut out).await.unwrap();
        sender.await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "OPTIONS sip:x SIP/2.0\nMax-Forwards: 0\n");
    }
}
