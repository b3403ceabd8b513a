//! IKEv2 availability probe
//!
//! An `IKE_SA_INIT` request with a single conservative proposal. Any IKE
//! daemon answers it, either with its own `IKE_SA_INIT` or with a notify
//! such as `INVALID_KE_PAYLOAD`; both count as alive.

use super::checker::AvailabilityChecker;
use super::transport;
use crate::protocol::VpnProtocol;
use crate::server::ServerIp;
use async_trait::async_trait;
use rand::RngCore;
use std::time::Duration;
use tracing::debug;

const PAYLOAD_NONE: u8 = 0;
const PAYLOAD_SA: u8 = 33;
const PAYLOAD_KE: u8 = 34;
const PAYLOAD_NONCE: u8 = 40;

const IKE_VERSION_2: u8 = 0x20;
const EXCHANGE_IKE_SA_INIT: u8 = 34;
const FLAG_INITIATOR: u8 = 0x08;
const IKE_HEADER_LEN: usize = 28;

const TRANSFORM_ENCR: u8 = 1;
const TRANSFORM_PRF: u8 = 2;
const TRANSFORM_INTEG: u8 = 3;
const TRANSFORM_DH: u8 = 4;
const ENCR_AES_CBC: u16 = 12;
const PRF_HMAC_SHA2_256: u16 = 5;
const AUTH_HMAC_SHA2_256_128: u16 = 12;
const DH_MODP_2048: u16 = 14;
const ATTRIBUTE_KEY_LENGTH: u16 = 0x800e;

const MODP_2048_KE_LEN: usize = 256;
const NONCE_LEN: usize = 32;

/// Port on which IKE shares the socket with ESP-in-UDP
const NAT_T_PORT: u16 = 4500;

fn transform(last: bool, kind: u8, id: u16, key_length: Option<u16>) -> Vec<u8> {
    let length: u16 = if key_length.is_some() { 12 } else { 8 };
    let mut out = vec![if last { 0 } else { 3 }, 0];
    out.extend_from_slice(&length.to_be_bytes());
    out.push(kind);
    out.push(0);
    out.extend_from_slice(&id.to_be_bytes());
    if let Some(bits) = key_length {
        out.extend_from_slice(&ATTRIBUTE_KEY_LENGTH.to_be_bytes());
        out.extend_from_slice(&bits.to_be_bytes());
    }
    out
}

fn payload(next: u8, body: &[u8]) -> Vec<u8> {
    let length = (body.len() + 4) as u16;
    let mut out = vec![next, 0];
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn sa_payload() -> Vec<u8> {
    let transforms: Vec<u8> = [
        transform(false, TRANSFORM_ENCR, ENCR_AES_CBC, Some(256)),
        transform(false, TRANSFORM_PRF, PRF_HMAC_SHA2_256, None),
        transform(false, TRANSFORM_INTEG, AUTH_HMAC_SHA2_256_128, None),
        transform(true, TRANSFORM_DH, DH_MODP_2048, None),
    ]
    .concat();

    // proposal #1, protocol IKE, no SPI, four transforms
    let proposal_len = (8 + transforms.len()) as u16;
    let mut proposal = vec![0, 0];
    proposal.extend_from_slice(&proposal_len.to_be_bytes());
    proposal.extend_from_slice(&[1, 1, 0, 4]);
    proposal.extend_from_slice(&transforms);

    payload(PAYLOAD_KE, &proposal)
}

/// Build an `IKE_SA_INIT` request
pub fn sa_init_packet(initiator_spi: [u8; 8], key_exchange: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut ke_body = Vec::with_capacity(4 + key_exchange.len());
    ke_body.extend_from_slice(&DH_MODP_2048.to_be_bytes());
    ke_body.extend_from_slice(&[0, 0]);
    ke_body.extend_from_slice(key_exchange);

    let payloads = [
        sa_payload(),
        payload(PAYLOAD_NONCE, &ke_body),
        payload(PAYLOAD_NONE, nonce),
    ]
    .concat();

    let total = (IKE_HEADER_LEN + payloads.len()) as u32;
    let mut packet = Vec::with_capacity(total as usize);
    packet.extend_from_slice(&initiator_spi);
    packet.extend_from_slice(&[0u8; 8]);
    packet.push(PAYLOAD_SA);
    packet.push(IKE_VERSION_2);
    packet.push(EXCHANGE_IKE_SA_INIT);
    packet.push(FLAG_INITIATOR);
    packet.extend_from_slice(&0u32.to_be_bytes());
    packet.extend_from_slice(&total.to_be_bytes());
    packet.extend_from_slice(&payloads);
    packet
}

pub struct IkeAvailabilityChecker {
    ports: Vec<u16>,
    timeout: Duration,
}

impl IkeAvailabilityChecker {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }

    fn packet(port: u16) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        let mut spi = [0u8; 8];
        let mut key_exchange = [0u8; MODP_2048_KE_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut spi);
        rng.fill_bytes(&mut key_exchange);
        rng.fill_bytes(&mut nonce);

        let packet = sa_init_packet(spi, &key_exchange, &nonce);
        if port == NAT_T_PORT {
            [&[0u8; 4][..], &packet[..]].concat()
        } else {
            packet
        }
    }
}

#[async_trait]
impl AvailabilityChecker for IkeAvailabilityChecker {
    fn vpn_protocol(&self) -> VpnProtocol {
        VpnProtocol::Ike
    }

    fn default_ports(&self) -> Vec<u16> {
        self.ports.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn ping(&self, server: &ServerIp, port: u16) -> bool {
        let Some(host) = server.entry_ip_for(VpnProtocol::Ike) else {
            return false;
        };
        let packet = Self::packet(port);

        let exchange = async {
            let addr = transport::resolve(host, port).await?;
            transport::udp_exchange(addr, &packet).await
        };
        match exchange.await {
            Ok(received) => received > 0,
            Err(e) => {
                debug!(host, port, "IKEv2 probe failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields() {
        let spi = [0xa1; 8];
        let packet = sa_init_packet(spi, &[0x55; MODP_2048_KE_LEN], &[0x66; NONCE_LEN]);

        assert_eq!(&packet[..8], &spi);
        assert_eq!(&packet[8..16], &[0; 8]);
        assert_eq!(packet[16], PAYLOAD_SA);
        assert_eq!(packet[17], 0x20);
        assert_eq!(packet[18], 34);
        assert_eq!(packet[19], 0x08);
        assert_eq!(&packet[20..24], &[0; 4]);

        let length = u32::from_be_bytes([packet[24], packet[25], packet[26], packet[27]]);
        assert_eq!(length as usize, packet.len());
    }

    #[test]
    fn test_payload_chain_is_consistent() {
        let packet = sa_init_packet([1; 8], &[0; MODP_2048_KE_LEN], &[0; NONCE_LEN]);

        // walk the generic payload headers
        let mut next = packet[16];
        let mut offset = IKE_HEADER_LEN;
        let mut seen = Vec::new();
        while next != PAYLOAD_NONE {
            seen.push(next);
            let len = u16::from_be_bytes([packet[offset + 2], packet[offset + 3]]) as usize;
            next = packet[offset];
            offset += len;
        }

        assert_eq!(seen, vec![PAYLOAD_SA, PAYLOAD_KE, PAYLOAD_NONCE]);
        assert_eq!(offset, packet.len());
    }

    #[test]
    fn test_key_exchange_names_modp_2048() {
        let packet = sa_init_packet([1; 8], &[0; MODP_2048_KE_LEN], &[0; NONCE_LEN]);
        let sa_len = u16::from_be_bytes([packet[30], packet[31]]) as usize;
        let ke = IKE_HEADER_LEN + sa_len;

        assert_eq!(&packet[ke + 4..ke + 6], &DH_MODP_2048.to_be_bytes());
        let ke_len = u16::from_be_bytes([packet[ke + 2], packet[ke + 3]]) as usize;
        assert_eq!(ke_len, 4 + 4 + MODP_2048_KE_LEN);
    }

    #[test]
    fn test_nat_t_port_gets_non_esp_marker() {
        let plain = IkeAvailabilityChecker::packet(500);
        let natt = IkeAvailabilityChecker::packet(NAT_T_PORT);

        assert_eq!(natt.len(), plain.len() + 4);
        assert_eq!(&natt[..4], &[0; 4]);
        assert_eq!(natt[4 + 17], 0x20);
    }
}
