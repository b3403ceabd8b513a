//! Local agent connection states
//!
//! The transport reports states as strings. Unknown strings map to `None`
//! and are ignored by the state machine.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalAgentState {
    Connecting,
    Connected,
    SoftJailed,
    HardJailed,
    ConnectionError,
    ServerUnreachable,
    WaitingForNetwork,
    ServerCertificateError,
    ClientCertificateError,
    Disconnected,
}

impl LocalAgentState {
    /// Parse a state string reported by the transport
    pub fn from_transport(state: &str) -> Option<Self> {
        let state = match state {
            "Connecting" => Self::Connecting,
            "Connected" => Self::Connected,
            "SoftJailed" => Self::SoftJailed,
            "HardJailed" => Self::HardJailed,
            "ConnectionError" => Self::ConnectionError,
            "ServerUnreachable" => Self::ServerUnreachable,
            "WaitingForNetwork" => Self::WaitingForNetwork,
            "ServerCertificateError" => Self::ServerCertificateError,
            "ClientCertificateError" => Self::ClientCertificateError,
            "Disconnected" => Self::Disconnected,
            _ => return None,
        };
        Some(state)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::SoftJailed => "SoftJailed",
            Self::HardJailed => "HardJailed",
            Self::ConnectionError => "ConnectionError",
            Self::ServerUnreachable => "ServerUnreachable",
            Self::WaitingForNetwork => "WaitingForNetwork",
            Self::ServerCertificateError => "ServerCertificateError",
            Self::ClientCertificateError => "ClientCertificateError",
            Self::Disconnected => "Disconnected",
        }
    }

    /// States in which the session cannot carry traffic
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::HardJailed
                | Self::ConnectionError
                | Self::ServerUnreachable
                | Self::ServerCertificateError
                | Self::ClientCertificateError
        )
    }
}

impl fmt::Display for LocalAgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
