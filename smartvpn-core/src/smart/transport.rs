//! One-shot probe exchanges over UDP, TCP and TLS
//!
//! Each exchange sends a single packet and waits for the first bytes of a
//! reply. Callers bound the wait; nothing here retries.

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio_rustls::TlsConnector;

/// Resolve `host:port` to the first address
pub async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", host)))
}

/// Send `packet` as one datagram and wait for any reply
pub async fn udp_exchange(addr: SocketAddr, packet: &[u8]) -> io::Result<usize> {
    let local = if addr.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;
    socket.send(packet).await?;

    let mut buf = [0u8; 2048];
    socket.recv(&mut buf).await
}

/// Open a TCP connection, write `packet` and read the first reply bytes
pub async fn tcp_exchange(addr: SocketAddr, packet: &[u8]) -> io::Result<usize> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(packet).await?;
    stream.flush().await?;

    let mut buf = [0u8; 2048];
    stream.read(&mut buf).await
}

/// Connector trusting the bundled web PKI roots
pub fn tls_connector() -> TlsConnector {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Like [`tcp_exchange`] inside a TLS session named `server_name`
pub async fn tls_exchange(
    connector: &TlsConnector,
    addr: SocketAddr,
    server_name: &str,
    packet: &[u8],
) -> io::Result<usize> {
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid TLS server name: {}", server_name),
            )
        })?;

    let stream = TcpStream::connect(addr).await?;
    let mut tls = connector.connect(name, stream).await?;
    tls.write_all(packet).await?;
    tls.flush().await?;

    let mut buf = [0u8; 2048];
    tls.read(&mut buf).await
}

/// Two-byte big-endian length prefix used by stream transports
pub fn length_prefixed(packet: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(packet.len() + 2);
    framed.extend_from_slice(&(packet.len() as u16).to_be_bytes());
    framed.extend_from_slice(packet);
    framed
}
