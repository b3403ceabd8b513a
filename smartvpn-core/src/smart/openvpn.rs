//! OpenVPN availability probe
//!
//! Sends a `P_CONTROL_HARD_RESET_CLIENT_V2` packet authenticated with the
//! `tls-auth` static key. A server configured with the same key answers
//! with its own hard reset; anything else drops the packet silently.

use super::checker::AvailabilityChecker;
use super::hmac::hmac_sha512;
use super::transport;
use crate::config::OpenVpnConfig;
use crate::error::ProbeError;
use crate::protocol::{OpenVpnTransport, VpnProtocol};
use crate::server::ServerIp;
use async_trait::async_trait;
use data_encoding::HEXLOWER_PERMISSIVE;
use rand::RngCore;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// `P_CONTROL_HARD_RESET_CLIENT_V2` with key id 0
const HARD_RESET_CLIENT_V2: u8 = 7 << 3;

/// HMAC key size taken from the tail of the static key
const HMAC_KEY_LEN: usize = 64;

/// Extract the outgoing HMAC key from a `tls-auth` static key
///
/// Accepts the raw hex or the full key file with its marker lines.
pub fn parse_static_key(text: &str) -> Result<Vec<u8>, ProbeError> {
    let hex: String = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("-----"))
        .collect();

    let bytes = HEXLOWER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|_| ProbeError::InvalidStaticKey)?;

    if bytes.len() < HMAC_KEY_LEN {
        return Err(ProbeError::InvalidStaticKey);
    }
    Ok(bytes[bytes.len() - HMAC_KEY_LEN..].to_vec())
}

/// Build the hard reset packet
///
/// The HMAC covers packet id, timestamp, opcode, session id and an empty
/// ack array; on the wire the HMAC follows the session id. Stream
/// transports prefix the packet with its length.
pub fn hard_reset_packet(
    key: &[u8],
    session_id: [u8; 8],
    timestamp: u32,
    transport: OpenVpnTransport,
) -> Vec<u8> {
    let packet_id = 1u32.to_be_bytes();
    let timestamp = timestamp.to_be_bytes();
    let ack_and_message_id = [0u8; 5];

    let mut signed = Vec::with_capacity(22);
    signed.extend_from_slice(&packet_id);
    signed.extend_from_slice(&timestamp);
    signed.push(HARD_RESET_CLIENT_V2);
    signed.extend_from_slice(&session_id);
    signed.extend_from_slice(&ack_and_message_id);

    let hash = hmac_sha512(key, &signed);

    let mut packet = Vec::with_capacity(86);
    packet.push(HARD_RESET_CLIENT_V2);
    packet.extend_from_slice(&session_id);
    packet.extend_from_slice(&hash);
    packet.extend_from_slice(&packet_id);
    packet.extend_from_slice(&timestamp);
    packet.extend_from_slice(&ack_and_message_id);

    match transport {
        OpenVpnTransport::Udp => packet,
        OpenVpnTransport::Tcp => transport::length_prefixed(&packet),
    }
}

pub struct OpenVpnAvailabilityChecker {
    transport: OpenVpnTransport,
    key: Option<Vec<u8>>,
    ports: Vec<u16>,
    timeout: Duration,
}

impl OpenVpnAvailabilityChecker {
    pub fn new(transport: OpenVpnTransport, config: &OpenVpnConfig, timeout: Duration) -> Self {
        let key = match parse_static_key(&config.static_key) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(?transport, "OpenVPN probes disabled: {}", e);
                None
            }
        };
        let ports = match transport {
            OpenVpnTransport::Udp => config.udp_ports.clone(),
            OpenVpnTransport::Tcp => config.tcp_ports.clone(),
        };

        Self {
            transport,
            key,
            ports,
            timeout,
        }
    }

    fn packet(&self, key: &[u8]) -> Vec<u8> {
        let mut session_id = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut session_id);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();

        hard_reset_packet(key, session_id, timestamp, self.transport)
    }
}

#[async_trait]
impl AvailabilityChecker for OpenVpnAvailabilityChecker {
    fn vpn_protocol(&self) -> VpnProtocol {
        VpnProtocol::OpenVpn(self.transport)
    }

    fn default_ports(&self) -> Vec<u16> {
        self.ports.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn ping(&self, server: &ServerIp, port: u16) -> bool {
        let Some(key) = self.key.as_deref() else {
            return false;
        };
        let Some(host) = server.entry_ip_for(self.vpn_protocol()) else {
            return false;
        };

        let packet = self.packet(key);
        let exchange = async {
            let addr = transport::resolve(host, port).await?;
            match self.transport {
                OpenVpnTransport::Udp => transport::udp_exchange(addr, &packet).await,
                OpenVpnTransport::Tcp => transport::tcp_exchange(addr, &packet).await,
            }
        };

        match exchange.await {
            Ok(received) => received > 0,
            Err(e) => {
                debug!(host, port, transport = ?self.transport, "OpenVPN probe failed: {}", e);
                false
            }
        }
    }
}
