//! VPN protocol identities and platform-dependent priority

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpenVpnTransport {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireGuardTransport {
    Udp,
    Tcp,
    Tls,
}

/// A tunnelling protocol together with its transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VpnProtocol {
    Ike,
    OpenVpn(OpenVpnTransport),
    WireGuard(WireGuardTransport),
}

/// Client platform; selects the protocol priority profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Macos,
}

impl Default for Platform {
    fn default() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Macos
        }
    }
}

impl VpnProtocol {
    pub const ALL: [VpnProtocol; 6] = [
        VpnProtocol::Ike,
        VpnProtocol::OpenVpn(OpenVpnTransport::Udp),
        VpnProtocol::OpenVpn(OpenVpnTransport::Tcp),
        VpnProtocol::WireGuard(WireGuardTransport::Udp),
        VpnProtocol::WireGuard(WireGuardTransport::Tcp),
        VpnProtocol::WireGuard(WireGuardTransport::Tls),
    ];

    /// Priority on `platform`; lower numbers win
    ///
    /// WireGuard over TLS is a censorship workaround and always ranks last.
    pub fn priority(&self, platform: Platform) -> u8 {
        use OpenVpnTransport as O;
        use WireGuardTransport as W;

        match (platform, self) {
            (_, VpnProtocol::WireGuard(W::Udp)) => 0,
            (_, VpnProtocol::WireGuard(W::Tcp)) => 1,
            (Platform::Ios, VpnProtocol::OpenVpn(O::Udp)) => 2,
            (Platform::Ios, VpnProtocol::OpenVpn(O::Tcp)) => 3,
            (Platform::Ios, VpnProtocol::Ike) => 4,
            (Platform::Macos, VpnProtocol::Ike) => 2,
            (Platform::Macos, VpnProtocol::OpenVpn(O::Udp)) => 3,
            (Platform::Macos, VpnProtocol::OpenVpn(O::Tcp)) => 4,
            (_, VpnProtocol::WireGuard(W::Tls)) => 5,
        }
    }

    /// Key of this protocol in a server's `EntryPerProtocol` map
    pub fn entry_key(&self) -> &'static str {
        match self {
            VpnProtocol::Ike => "IKEv2",
            VpnProtocol::OpenVpn(OpenVpnTransport::Udp) => "OpenVPNUDP",
            VpnProtocol::OpenVpn(OpenVpnTransport::Tcp) => "OpenVPNTCP",
            VpnProtocol::WireGuard(WireGuardTransport::Udp) => "WireGuardUDP",
            VpnProtocol::WireGuard(WireGuardTransport::Tcp) => "WireGuardTCP",
            VpnProtocol::WireGuard(WireGuardTransport::Tls) => "WireGuardTLS",
        }
    }
}

impl fmt::Display for VpnProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VpnProtocol::Ike => "ikev2",
            VpnProtocol::OpenVpn(OpenVpnTransport::Udp) => "openvpn-udp",
            VpnProtocol::OpenVpn(OpenVpnTransport::Tcp) => "openvpn-tcp",
            VpnProtocol::WireGuard(WireGuardTransport::Udp) => "wireguard-udp",
            VpnProtocol::WireGuard(WireGuardTransport::Tcp) => "wireguard-tcp",
            VpnProtocol::WireGuard(WireGuardTransport::Tls) => "wireguard-tls",
        };
        f.write_str(name)
    }
}

impl FromStr for VpnProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VpnProtocol::ALL
            .into_iter()
            .find(|protocol| protocol.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown protocol: {}", s))
    }
}
