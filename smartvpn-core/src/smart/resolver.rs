//! Maps a protocol to the checker that probes it

use super::checker::AvailabilityChecker;
use super::ikev2::IkeAvailabilityChecker;
use super::openvpn::OpenVpnAvailabilityChecker;
use super::wireguard::WireguardAvailabilityChecker;
use crate::config::ClientConfig;
use crate::protocol::{OpenVpnTransport, VpnProtocol, WireGuardTransport};
use std::sync::Arc;

pub trait AvailabilityCheckerResolver: Send + Sync {
    fn availability_checker(&self, protocol: VpnProtocol) -> Arc<dyn AvailabilityChecker>;
}

/// Network-backed checkers built from the client configuration
pub struct DefaultCheckerResolver {
    ike: Arc<dyn AvailabilityChecker>,
    openvpn_udp: Arc<dyn AvailabilityChecker>,
    openvpn_tcp: Arc<dyn AvailabilityChecker>,
    wireguard_udp: Arc<dyn AvailabilityChecker>,
    wireguard_tcp: Arc<dyn AvailabilityChecker>,
    wireguard_tls: Arc<dyn AvailabilityChecker>,
}

impl DefaultCheckerResolver {
    pub fn new(config: &ClientConfig) -> Self {
        let timeout = config.probe.timeout();
        let openvpn = |transport| -> Arc<dyn AvailabilityChecker> {
            Arc::new(OpenVpnAvailabilityChecker::new(transport, &config.openvpn, timeout))
        };
        let wireguard = |transport| -> Arc<dyn AvailabilityChecker> {
            Arc::new(WireguardAvailabilityChecker::new(transport, &config.wireguard, timeout))
        };

        Self {
            ike: Arc::new(IkeAvailabilityChecker::new(config.ikev2.ports.clone(), timeout)),
            openvpn_udp: openvpn(OpenVpnTransport::Udp),
            openvpn_tcp: openvpn(OpenVpnTransport::Tcp),
            wireguard_udp: wireguard(WireGuardTransport::Udp),
            wireguard_tcp: wireguard(WireGuardTransport::Tcp),
            wireguard_tls: wireguard(WireGuardTransport::Tls),
        }
    }
}

impl AvailabilityCheckerResolver for DefaultCheckerResolver {
    fn availability_checker(&self, protocol: VpnProtocol) -> Arc<dyn AvailabilityChecker> {
        let checker = match protocol {
            VpnProtocol::Ike => &self.ike,
            VpnProtocol::OpenVpn(OpenVpnTransport::Udp) => &self.openvpn_udp,
            VpnProtocol::OpenVpn(OpenVpnTransport::Tcp) => &self.openvpn_tcp,
            VpnProtocol::WireGuard(WireGuardTransport::Udp) => &self.wireguard_udp,
            VpnProtocol::WireGuard(WireGuardTransport::Tcp) => &self.wireguard_tcp,
            VpnProtocol::WireGuard(WireGuardTransport::Tls) => &self.wireguard_tls,
        };
        Arc::clone(checker)
    }
}
