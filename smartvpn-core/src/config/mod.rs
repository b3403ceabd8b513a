//! Configuration module
//!
//! Remote-config driven settings: which protocol families take part in
//! smart protocol negotiation, their default ports, probe timing, the local
//! agent endpoint and feature flags. Everything has a serde default so a
//! partial file loads.

use crate::error::ConfigValidationError;
use crate::protocol::{OpenVpnTransport, Platform, VpnProtocol, WireGuardTransport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod toml_config;

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSettings,

    #[serde(default)]
    pub smart_protocol: SmartProtocolConfig,

    #[serde(default)]
    pub openvpn: OpenVpnConfig,

    #[serde(default)]
    pub wireguard: WireguardConfig,

    #[serde(default)]
    pub ikev2: Ikev2Config,

    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub local_agent: LocalAgentSettings,

    #[serde(default)]
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub platform: Platform,
}

/// Protocol families allowed to take part in negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartProtocolConfig {
    #[serde(default = "enabled")]
    pub openvpn: bool,
    #[serde(default = "enabled")]
    pub ikev2: bool,
    #[serde(default = "enabled")]
    pub wireguard_udp: bool,
    #[serde(default = "enabled")]
    pub wireguard_tcp: bool,
    #[serde(default = "enabled")]
    pub wireguard_tls: bool,
}

fn enabled() -> bool {
    true
}

impl Default for SmartProtocolConfig {
    fn default() -> Self {
        Self {
            openvpn: true,
            ikev2: true,
            wireguard_udp: true,
            wireguard_tcp: true,
            wireguard_tls: true,
        }
    }
}

impl SmartProtocolConfig {
    /// Everything switched off
    pub fn none() -> Self {
        Self {
            openvpn: false,
            ikev2: false,
            wireguard_udp: false,
            wireguard_tcp: false,
            wireguard_tls: false,
        }
    }

    /// Protocols contributed by the enabled families
    pub fn enabled_protocols(&self) -> Vec<VpnProtocol> {
        let mut protocols = Vec::new();
        if self.ikev2 {
            protocols.push(VpnProtocol::Ike);
        }
        if self.openvpn {
            protocols.push(VpnProtocol::OpenVpn(OpenVpnTransport::Udp));
            protocols.push(VpnProtocol::OpenVpn(OpenVpnTransport::Tcp));
        }
        if self.wireguard_udp {
            protocols.push(VpnProtocol::WireGuard(WireGuardTransport::Udp));
        }
        if self.wireguard_tcp {
            protocols.push(VpnProtocol::WireGuard(WireGuardTransport::Tcp));
        }
        if self.wireguard_tls {
            protocols.push(VpnProtocol::WireGuard(WireGuardTransport::Tls));
        }
        protocols
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenVpnConfig {
    #[serde(default = "default_openvpn_udp_ports")]
    pub udp_ports: Vec<u16>,

    #[serde(default = "default_openvpn_tcp_ports")]
    pub tcp_ports: Vec<u16>,

    /// `tls-auth` static key, hex with or without the PEM-style markers
    #[serde(default)]
    pub static_key: String,
}

fn default_openvpn_udp_ports() -> Vec<u16> {
    vec![80, 51820, 4569, 1194, 5060]
}
fn default_openvpn_tcp_ports() -> Vec<u16> {
    vec![443, 7770, 8443]
}

impl Default for OpenVpnConfig {
    fn default() -> Self {
        Self {
            udp_ports: default_openvpn_udp_ports(),
            tcp_ports: default_openvpn_tcp_ports(),
            static_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireguardConfig {
    #[serde(default = "default_wireguard_udp_ports")]
    pub udp_ports: Vec<u16>,

    #[serde(default = "default_wireguard_tcp_ports")]
    pub tcp_ports: Vec<u16>,

    #[serde(default = "default_wireguard_tls_ports")]
    pub tls_ports: Vec<u16>,
}

fn default_wireguard_udp_ports() -> Vec<u16> {
    vec![51820, 88, 1224, 500, 4500]
}
fn default_wireguard_tcp_ports() -> Vec<u16> {
    vec![443]
}
fn default_wireguard_tls_ports() -> Vec<u16> {
    vec![443]
}

impl Default for WireguardConfig {
    fn default() -> Self {
        Self {
            udp_ports: default_wireguard_udp_ports(),
            tcp_ports: default_wireguard_tcp_ports(),
            tls_ports: default_wireguard_tls_ports(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ikev2Config {
    #[serde(default = "default_ike_ports")]
    pub ports: Vec<u16>,
}

fn default_ike_ports() -> Vec<u16> {
    vec![500]
}

impl Default for Ikev2Config {
    fn default() -> Self {
        Self {
            ports: default_ike_ports(),
        }
    }
}

/// Probe timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// How long a single port probe waits for any reply
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,

    /// Pause before the single WireGuard port retry
    #[serde(default = "default_retry_delay")]
    pub wireguard_retry_delay_ms: u64,
}

fn default_probe_timeout() -> u64 {
    3000
}
fn default_retry_delay() -> u64 {
    1000
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout(),
            wireguard_retry_delay_ms: default_retry_delay(),
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.wireguard_retry_delay_ms)
    }
}

/// Local agent endpoint and statistics polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAgentSettings {
    /// Agent address inside the tunnel
    #[serde(default = "default_agent_host")]
    pub host: String,

    /// Name the agent certificate is checked against instead of the
    /// server domain
    #[serde(default)]
    pub cert_server_name: Option<String>,

    /// PEM bundle of the CAs allowed to sign the agent certificate
    #[serde(default)]
    pub server_ca_file: Option<PathBuf>,

    #[serde(default = "default_statistics_interval")]
    pub statistics_interval_secs: u64,

    #[serde(default = "default_statistics_leeway")]
    pub statistics_leeway_secs: u64,
}

fn default_agent_host() -> String {
    "10.2.0.1:65432".to_string()
}
fn default_statistics_interval() -> u64 {
    60
}
fn default_statistics_leeway() -> u64 {
    5
}

impl Default for LocalAgentSettings {
    fn default() -> Self {
        Self {
            host: default_agent_host(),
            cert_server_name: None,
            server_ca_file: None,
            statistics_interval_secs: default_statistics_interval(),
            statistics_leeway_secs: default_statistics_leeway(),
        }
    }
}

impl LocalAgentSettings {
    pub fn statistics_interval(&self) -> Duration {
        Duration::from_secs(self.statistics_interval_secs)
    }

    /// Read the configured CA bundle; empty when none is configured
    ///
    /// A configured file without any content is an error.
    pub fn load_server_ca(&self) -> std::io::Result<String> {
        let Some(path) = &self.server_ca_file else {
            return Ok(String::new());
        };
        let pem = std::fs::read_to_string(path)?;
        if pem.trim().is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("CA bundle {} is empty", path.display()),
            ));
        }
        Ok(pem)
    }
}

/// Remote feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "enabled")]
    pub netshield_stats: bool,

    #[serde(default)]
    pub safe_mode: bool,

    #[serde(default)]
    pub connection_details: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            netshield_stats: true,
            safe_mode: false,
            connection_details: false,
        }
    }
}

impl ClientConfig {
    /// Static default ports for `protocol`
    pub fn default_ports(&self, protocol: VpnProtocol) -> Vec<u16> {
        match protocol {
            VpnProtocol::Ike => self.ikev2.ports.clone(),
            VpnProtocol::OpenVpn(OpenVpnTransport::Udp) => self.openvpn.udp_ports.clone(),
            VpnProtocol::OpenVpn(OpenVpnTransport::Tcp) => self.openvpn.tcp_ports.clone(),
            VpnProtocol::WireGuard(WireGuardTransport::Udp) => self.wireguard.udp_ports.clone(),
            VpnProtocol::WireGuard(WireGuardTransport::Tcp) => self.wireguard.tcp_ports.clone(),
            VpnProtocol::WireGuard(WireGuardTransport::Tls) => self.wireguard.tls_ports.clone(),
        }
    }

    /// Validate the entire configuration
    ///
    /// # Returns
    ///
    /// * `Ok(())` if all fields are valid
    /// * `Err(ConfigValidationError)` with the first validation error encountered
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.validate_ports()?;
        self.validate_probe()?;
        self.validate_local_agent()?;
        Ok(())
    }

    fn validate_ports(&self) -> Result<(), ConfigValidationError> {
        for protocol in VpnProtocol::ALL {
            let ports = self.default_ports(protocol);
            if ports.is_empty() {
                return Err(ConfigValidationError::EmptyPorts(protocol.to_string()));
            }
            if ports.contains(&0) {
                return Err(ConfigValidationError::ZeroPort(protocol.to_string()));
            }
        }
        Ok(())
    }

    fn validate_probe(&self) -> Result<(), ConfigValidationError> {
        if !(100..=30_000).contains(&self.probe.timeout_ms) {
            return Err(ConfigValidationError::InvalidProbeTimeout(
                self.probe.timeout_ms,
            ));
        }
        if self.probe.wireguard_retry_delay_ms > 10_000 {
            return Err(ConfigValidationError::InvalidRetryDelay(
                self.probe.wireguard_retry_delay_ms,
            ));
        }
        Ok(())
    }

    fn validate_local_agent(&self) -> Result<(), ConfigValidationError> {
        let agent = &self.local_agent;
        if !(5..=3600).contains(&agent.statistics_interval_secs) {
            return Err(ConfigValidationError::InvalidStatisticsInterval(
                agent.statistics_interval_secs,
            ));
        }
        if agent.statistics_leeway_secs >= agent.statistics_interval_secs {
            return Err(ConfigValidationError::LeewayTooLarge {
                leeway: agent.statistics_leeway_secs,
                interval: agent.statistics_interval_secs,
            });
        }
        match agent.host.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
            _ => Err(ConfigValidationError::InvalidAgentHost(agent.host.clone())),
        }
    }
}
