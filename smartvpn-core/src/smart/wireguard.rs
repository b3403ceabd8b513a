//! WireGuard availability probe
//!
//! Builds a genuine Noise_IKpsk2 handshake initiation against the server's
//! static X25519 key, using a throwaway initiator identity. The server
//! validates `mac1` before doing anything else, so only a correctly keyed
//! message can elicit a reply (usually a cookie or handshake response).
//!
//! UDP sends the 148-byte message as is; the TCP and TLS transports frame
//! it with a two-byte big-endian length.

use super::checker::AvailabilityChecker;
use super::transport;
use crate::config::WireguardConfig;
use crate::error::ProbeError;
use crate::protocol::{VpnProtocol, WireGuardTransport};
use crate::server::ServerIp;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blake2::digest::consts::U16;
use blake2::digest::{KeyInit, Mac};
use blake2::{Blake2s256, Blake2sMac, Digest};
use rand::rngs::OsRng;
use rand::RngCore;
use snow::params::NoiseParams;
use snow::Builder;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_rustls::TlsConnector;
use tracing::debug;
use x25519_dalek::{PublicKey, StaticSecret};

const NOISE_PARAMS: &str = "Noise_IKpsk2_25519_ChaChaPoly_BLAKE2s";
/// Noise prologue
const IDENTIFIER: &[u8] = b"WireGuard v1 zx2c4 Jason@zx2c4.com";
const LABEL_MAC1: &[u8] = b"mac1----";
/// psk2 first enters the handshake in the response
const PRESHARED_KEY: [u8; 32] = [0u8; 32];

const MESSAGE_HANDSHAKE_INITIATION: u8 = 1;
pub const INITIATION_LEN: usize = 148;
const NOISE_OFFSET: usize = 8;
const MAC1_OFFSET: usize = 116;

/// TAI64 label for the Unix epoch
const TAI64_EPOCH: u64 = 0x4000_0000_0000_000a;

fn noise_params() -> Result<NoiseParams, ProbeError> {
    NOISE_PARAMS
        .parse()
        .map_err(|_| ProbeError::HandshakeEncryption)
}

pub(crate) fn mac1(server_public: &[u8; 32], message: &[u8]) -> Result<[u8; 16], ProbeError> {
    let mut hasher = Blake2s256::new();
    hasher.update(LABEL_MAC1);
    hasher.update(server_public);
    let key = hasher.finalize();

    let mut mac = <Blake2sMac<U16> as KeyInit>::new_from_slice(&key)
        .map_err(|_| ProbeError::HandshakeEncryption)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// TAI64N label for `now`
pub fn tai64n(now: SystemTime) -> [u8; 12] {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let mut out = [0u8; 12];
    out[..8].copy_from_slice(&(TAI64_EPOCH + since_epoch.as_secs()).to_be_bytes());
    out[8..].copy_from_slice(&since_epoch.subsec_nanos().to_be_bytes());
    out
}

/// Decode the server's base64 X25519 public key
pub fn server_public_key(server: &ServerIp) -> Result<PublicKey, ProbeError> {
    let encoded = server
        .x25519_public_key
        .as_deref()
        .ok_or(ProbeError::MissingServerKey)?;
    let bytes: [u8; 32] = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(ProbeError::MissingServerKey)?;
    Ok(PublicKey::from(bytes))
}

/// Inputs of one handshake initiation
pub struct Initiation<'a> {
    pub server_public: &'a PublicKey,
    pub initiator_static: &'a StaticSecret,
    pub sender_index: u32,
    pub timestamp: [u8; 12],
}

impl Initiation<'_> {
    /// Serialize the handshake initiation message
    ///
    /// The Noise first message (ephemeral, sealed static, sealed
    /// timestamp) sits between the WireGuard header and the MACs.
    pub fn to_bytes(&self) -> Result<[u8; INITIATION_LEN], ProbeError> {
        let server = self.server_public.as_bytes();
        let mut handshake = Builder::new(noise_params()?)
            .local_private_key(&self.initiator_static.to_bytes())
            .remote_public_key(server)
            .prologue(IDENTIFIER)
            .psk(2, &PRESHARED_KEY)
            .build_initiator()
            .map_err(|_| ProbeError::HandshakeEncryption)?;

        let mut message = [0u8; INITIATION_LEN];
        message[0] = MESSAGE_HANDSHAKE_INITIATION;
        message[4..NOISE_OFFSET].copy_from_slice(&self.sender_index.to_le_bytes());

        let written = handshake
            .write_message(&self.timestamp, &mut message[NOISE_OFFSET..MAC1_OFFSET])
            .map_err(|_| ProbeError::HandshakeEncryption)?;
        if written != MAC1_OFFSET - NOISE_OFFSET {
            return Err(ProbeError::HandshakeEncryption);
        }

        let mac = mac1(server, &message[..MAC1_OFFSET])?;
        message[MAC1_OFFSET..MAC1_OFFSET + 16].copy_from_slice(&mac);
        Ok(message)
    }
}

/// Fresh initiation with a throwaway identity
pub fn probe_initiation(server_public: &PublicKey) -> Result<[u8; INITIATION_LEN], ProbeError> {
    let initiator_static = StaticSecret::random_from_rng(OsRng);

    Initiation {
        server_public,
        initiator_static: &initiator_static,
        sender_index: OsRng.next_u32(),
        timestamp: tai64n(SystemTime::now()),
    }
    .to_bytes()
}

pub struct WireguardAvailabilityChecker {
    transport: WireGuardTransport,
    ports: Vec<u16>,
    timeout: Duration,
    tls: Option<TlsConnector>,
}

impl WireguardAvailabilityChecker {
    pub fn new(transport: WireGuardTransport, config: &WireguardConfig, timeout: Duration) -> Self {
        let (ports, tls) = match transport {
            WireGuardTransport::Udp => (config.udp_ports.clone(), None),
            WireGuardTransport::Tcp => (config.tcp_ports.clone(), None),
            WireGuardTransport::Tls => (config.tls_ports.clone(), Some(transport::tls_connector())),
        };

        Self {
            transport,
            ports,
            timeout,
            tls,
        }
    }
}

#[async_trait]
impl AvailabilityChecker for WireguardAvailabilityChecker {
    fn vpn_protocol(&self) -> VpnProtocol {
        VpnProtocol::WireGuard(self.transport)
    }

    fn default_ports(&self) -> Vec<u16> {
        self.ports.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn ping(&self, server: &ServerIp, port: u16) -> bool {
        let Some(host) = server.entry_ip_for(self.vpn_protocol()) else {
            return false;
        };
        let initiation = match server_public_key(server).and_then(|key| probe_initiation(&key)) {
            Ok(message) => message,
            Err(e) => {
                debug!(server = %server.domain, "WireGuard probe not sent: {}", e);
                return false;
            }
        };

        let exchange = async {
            let addr = transport::resolve(host, port).await?;
            match (self.transport, &self.tls) {
                (WireGuardTransport::Udp, _) => transport::udp_exchange(addr, &initiation).await,
                (WireGuardTransport::Tls, Some(connector)) => {
                    let framed = transport::length_prefixed(&initiation);
                    transport::tls_exchange(connector, addr, &server.domain, &framed).await
                }
                _ => {
                    let framed = transport::length_prefixed(&initiation);
                    transport::tcp_exchange(addr, &framed).await
                }
            }
        };

        match exchange.await {
            Ok(received) => received > 0,
            Err(e) => {
                debug!(host, port, transport = ?self.transport, "WireGuard probe failed: {}", e);
                false
            }
        }
    }
}
