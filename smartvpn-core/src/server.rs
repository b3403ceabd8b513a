//! Server descriptors as delivered by the server list
//!
//! A `ServerIp` is read-only input to probing. Per-protocol overrides may
//! replace the entry address and the port set; a server that publishes an
//! override map but leaves a protocol out of it does not support that
//! protocol at all.

use crate::error::SmartVpnError;
use crate::protocol::VpnProtocol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-protocol entry override
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    #[serde(rename = "IPv4", default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,

    #[serde(rename = "Ports", default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIp {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "EntryIP")]
    pub entry_ip: Option<String>,

    #[serde(rename = "ExitIP")]
    pub exit_ip: String,

    #[serde(rename = "Domain")]
    pub domain: String,

    /// 1 when the server is up, 0 under maintenance
    #[serde(rename = "Status")]
    pub status: u8,

    #[serde(rename = "Label", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Base64 X25519 public key used by WireGuard probes
    #[serde(
        rename = "X25519PublicKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub x25519_public_key: Option<String>,

    /// `null` values mean "supported, no override"
    #[serde(
        rename = "EntryPerProtocol",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub protocol_entries: Option<BTreeMap<String, Option<ProtocolEntry>>>,
}

impl ServerIp {
    /// Read a single server descriptor from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SmartVpnError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn is_under_maintenance(&self) -> bool {
        self.status == 0
    }

    fn protocol_entry(&self, protocol: VpnProtocol) -> Option<Option<&ProtocolEntry>> {
        match &self.protocol_entries {
            None => Some(None),
            Some(entries) => entries
                .get(protocol.entry_key())
                .map(|entry| entry.as_ref()),
        }
    }

    /// Address to probe or connect to for `protocol`
    ///
    /// `None` when the server does not support the protocol.
    pub fn entry_ip_for(&self, protocol: VpnProtocol) -> Option<&str> {
        let entry = self.protocol_entry(protocol)?;
        entry
            .and_then(|e| e.ipv4.as_deref())
            .or(self.entry_ip.as_deref())
    }

    pub fn supports(&self, protocol: VpnProtocol) -> bool {
        self.entry_ip_for(protocol).is_some()
    }

    /// Server-specific ports for `protocol`, if it publishes any
    pub fn override_ports(&self, protocol: VpnProtocol) -> Option<&[u16]> {
        self.protocol_entry(protocol)
            .flatten()
            .and_then(|e| e.ports.as_deref())
            .filter(|ports| !ports.is_empty())
    }
}
