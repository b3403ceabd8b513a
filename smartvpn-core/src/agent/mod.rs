//! Local agent control channel
//!
//! Talks to the agent running on the VPN server over an authenticated
//! channel inside the tunnel.

pub mod connection;
pub mod event;
pub mod features;
pub mod local_agent;
pub mod native_client;
pub mod network_monitor;
pub mod state;

// Public re-exports
pub use connection::{
    ConnectionDetails, ConnectionParams, FeatureStatistics, LocalAgentConnection,
    LocalAgentConnectionFactory, NetShieldStatistics, StatusMessage,
};
pub use event::LocalAgentEvent;
pub use features::{
    LocalAgentConfiguration, LocalAgentFeatures, NatType, NetShieldModel, NetShieldType,
    VpnConnectionFeatures,
};
pub use local_agent::{AgentPreferences, LocalAgent};
pub use native_client::{NativeClient, NativeEvent};
pub use network_monitor::{NetworkEvent, NetworkMonitor, NetworkMonitorError};
pub use state::LocalAgentState;
