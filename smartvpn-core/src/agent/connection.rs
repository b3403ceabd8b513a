//! Control channel transport contract
//!
//! The authenticated channel itself comes from a native transport library.
//! These traits are the seam it plugs into.

use super::features::LocalAgentFeatures;
use super::native_client::NativeClient;
use crate::error::ConnectionError;
use crate::types::ClientKeyPem;
use std::sync::Arc;

/// Addresses the server reports for the current session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub device_ip: Option<String>,
    pub device_country: Option<String>,
    pub server_ipv4: Option<String>,
    pub server_ipv6: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetShieldStatistics {
    pub malware_blocked: Option<u64>,
    pub ads_blocked: Option<u64>,
    pub trackers_blocked: Option<u64>,
    pub bytes_saved: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureStatistics {
    pub netshield: NetShieldStatistics,
}

/// Status pushed by the server or returned for `send_get_status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMessage {
    pub state: String,
    pub features: Option<LocalAgentFeatures>,
    pub connection_details: Option<ConnectionDetails>,
    pub feature_statistics: Option<FeatureStatistics>,
}

/// Everything needed to open the channel
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub client_certificate_pem: String,
    pub client_key_pem: ClientKeyPem,
    pub server_ca_pem: String,
    /// `host:port` of the agent inside the tunnel
    pub host: String,
    /// Name the agent certificate must be issued for
    pub cert_server_name: String,
    pub features: LocalAgentFeatures,
    pub connectivity: bool,
}

pub trait LocalAgentConnection: Send + Sync {
    /// Current state string
    fn state(&self) -> String;

    /// Last status received from the server
    fn status(&self) -> Option<StatusMessage>;

    fn close(&self);

    fn set_connectivity(&self, available: bool);

    /// Push a partial feature update without reconnecting
    fn set_features(&self, features: LocalAgentFeatures);

    fn send_get_status(&self, with_statistics: bool);
}

pub trait LocalAgentConnectionFactory: Send + Sync {
    /// Open a channel that reports back through `client`
    fn make_connection(
        &self,
        params: ConnectionParams,
        client: NativeClient,
    ) -> Result<Arc<dyn LocalAgentConnection>, ConnectionError>;
}
