//! Events the local agent publishes to its owner

use super::connection::{ConnectionDetails, FeatureStatistics};
use super::features::{NetShieldModel, VpnConnectionFeatures};
use super::state::LocalAgentState;
use crate::error::LocalAgentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAgentEvent {
    /// Published once per distinct state
    StateChanged(LocalAgentState),

    Error(LocalAgentError),

    /// Features the server reports as active
    Features(VpnConnectionFeatures),

    ConnectionDetails(ConnectionDetails),

    NetShieldStats(NetShieldModel),
}

impl From<&FeatureStatistics> for NetShieldModel {
    fn from(statistics: &FeatureStatistics) -> Self {
        let netshield = &statistics.netshield;
        NetShieldModel {
            trackers: netshield.trackers_blocked.unwrap_or(0),
            ads: netshield.ads_blocked.unwrap_or(0),
            data_saved: netshield.bytes_saved.unwrap_or(0),
            enabled: true,
        }
    }
}
