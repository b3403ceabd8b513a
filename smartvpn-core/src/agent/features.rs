//! Connection features negotiated over the local agent

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetShieldType {
    #[default]
    Off,
    Level1,
    Level2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatType {
    #[default]
    Strict,
    Moderate,
}

/// Features a certificate is issued with and a session runs with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnConnectionFeatures {
    pub netshield: NetShieldType,
    pub vpn_accelerator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bouncing: Option<String>,
    pub nat_type: NatType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_mode: Option<bool>,
}

impl VpnConnectionFeatures {
    /// Compare with a stored feature set
    ///
    /// Safe mode only takes part when its feature flag is on; a missing
    /// stored set never matches.
    pub fn equals(&self, other: Option<&VpnConnectionFeatures>, safe_mode_enabled: bool) -> bool {
        let Some(other) = other else {
            return false;
        };

        self.netshield == other.netshield
            && self.vpn_accelerator == other.vpn_accelerator
            && self.bouncing == other.bouncing
            && self.nat_type == other.nat_type
            && (!safe_mode_enabled || self.safe_mode == other.safe_mode)
    }
}

/// Partial feature bundle exchanged with the transport
///
/// Unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAgentFeatures {
    pub netshield: Option<NetShieldType>,
    pub vpn_accelerator: Option<bool>,
    pub bouncing: Option<String>,
    pub nat_type: Option<NatType>,
    pub safe_mode: Option<bool>,
    pub jailed: Option<bool>,
}

impl LocalAgentFeatures {
    pub fn with_netshield(mut self, level: NetShieldType) -> Self {
        self.netshield = Some(level);
        self
    }

    pub fn with_vpn_accelerator(mut self, enabled: bool) -> Self {
        self.vpn_accelerator = Some(enabled);
        self
    }

    pub fn with_bouncing(mut self, bouncing: Option<String>) -> Self {
        self.bouncing = bouncing;
        self
    }

    pub fn with_nat_type(mut self, nat_type: NatType) -> Self {
        self.nat_type = Some(nat_type);
        self
    }

    pub fn with_safe_mode(mut self, safe_mode: bool) -> Self {
        self.safe_mode = Some(safe_mode);
        self
    }

    pub fn with_jailed(mut self, jailed: bool) -> Self {
        self.jailed = Some(jailed);
        self
    }

    /// Complete bundle for a fresh connection
    pub fn from_connection_features(features: &VpnConnectionFeatures) -> Self {
        let bundle = Self::default()
            .with_netshield(features.netshield)
            .with_vpn_accelerator(features.vpn_accelerator)
            .with_bouncing(features.bouncing.clone())
            .with_nat_type(features.nat_type);
        match features.safe_mode {
            Some(safe_mode) => bundle.with_safe_mode(safe_mode),
            None => bundle,
        }
    }

    /// Feature set reported by the server, when it is complete
    pub fn vpn_features(&self) -> Option<VpnConnectionFeatures> {
        Some(VpnConnectionFeatures {
            netshield: self.netshield?,
            vpn_accelerator: self.vpn_accelerator?,
            bouncing: self.bouncing.clone(),
            nat_type: self.nat_type?,
            safe_mode: self.safe_mode,
        })
    }
}

/// Settings a local agent session is opened with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAgentConfiguration {
    /// Server domain the agent certificate is issued for
    pub hostname: String,
    pub features: VpnConnectionFeatures,
}

/// NetShield statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetShieldModel {
    pub trackers: u64,
    pub ads: u64,
    pub data_saved: u64,
    pub enabled: bool,
}

impl NetShieldModel {
    /// Snapshot published on disconnect
    pub fn zero() -> Self {
        Self::default()
    }
}
