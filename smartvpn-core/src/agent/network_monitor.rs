//! Network reachability monitoring via D-Bus
//!
//! Watches NetworkManager state changes and logind sleep signals so the local
//! agent can be told when connectivity comes back.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zbus::Connection;

/// NM_STATE_CONNECTED_GLOBAL
const NM_STATE_CONNECTED_GLOBAL: u32 = 70;

const NM_SERVICE: &str = "org.freedesktop.NetworkManager";
const NM_PATH: &str = "/org/freedesktop/NetworkManager";
const LOGIN_SERVICE: &str = "org.freedesktop.login1";
const LOGIN_PATH: &str = "/org/freedesktop/login1";
const LOGIN_MANAGER: &str = "org.freedesktop.login1.Manager";

/// Reachability changes relevant to the local agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    NetworkUp,
    NetworkDown,
    /// System resumed from suspend
    SystemResumed,
}

impl NetworkEvent {
    /// Map a NetworkManager state value to an event
    pub fn from_nm_state(state: u32) -> Self {
        if state >= NM_STATE_CONNECTED_GLOBAL {
            Self::NetworkUp
        } else {
            Self::NetworkDown
        }
    }
}

/// Monitors network state changes from NetworkManager
pub struct NetworkMonitor {
    connection: Connection,
}

impl NetworkMonitor {
    /// Connect to the system bus and check NetworkManager is present
    #[tracing::instrument]
    pub async fn new() -> Result<Self, NetworkMonitorError> {
        let connection = Connection::system().await?;

        let proxy = zbus::fdo::DBusProxy::new(&connection).await?;
        let bus_name = zbus::names::BusName::try_from(NM_SERVICE)
            .map_err(|e| NetworkMonitorError::QueryFailed(e.to_string()))?;
        let name_has_owner = proxy
            .name_has_owner(bus_name)
            .await
            .map_err(|e| NetworkMonitorError::QueryFailed(e.to_string()))?;

        if !name_has_owner {
            return Err(NetworkMonitorError::NetworkManagerUnavailable);
        }

        Ok(Self { connection })
    }

    /// Spawn the signal listeners
    ///
    /// Events flow until the receiver is dropped or the bus goes away.
    pub async fn start(self) -> Result<mpsc::UnboundedReceiver<NetworkEvent>, NetworkMonitorError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let nm = zbus::Proxy::new(&self.connection, NM_SERVICE, NM_PATH, NM_SERVICE).await?;
        let mut state_changes = nm.receive_signal("StateChanged").await?;
        let state_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(message) = state_changes.next().await {
                let state: u32 = match message.body().deserialize() {
                    Ok(state) => state,
                    Err(e) => {
                        warn!("Malformed StateChanged signal: {}", e);
                        continue;
                    }
                };
                let event = NetworkEvent::from_nm_state(state);
                debug!(state, ?event, "NetworkManager state changed");
                if state_tx.send(event).is_err() {
                    break;
                }
            }
        });

        match zbus::Proxy::new(&self.connection, LOGIN_SERVICE, LOGIN_PATH, LOGIN_MANAGER).await {
            Ok(login) => {
                let mut sleep_signals = login.receive_signal("PrepareForSleep").await?;
                tokio::spawn(async move {
                    while let Some(message) = sleep_signals.next().await {
                        let Ok(suspending) = message.body().deserialize::<bool>() else {
                            continue;
                        };
                        if !suspending {
                            info!("System resumed from suspend");
                            if tx.send(NetworkEvent::SystemResumed).is_err() {
                                break;
                            }
                        }
                    }
                });
            }
            Err(e) => warn!("logind unavailable, resume events disabled: {}", e),
        }

        Ok(rx)
    }

    /// Query whether the network currently has global connectivity
    #[tracing::instrument(skip(self))]
    pub async fn is_network_available(&self) -> Result<bool, NetworkMonitorError> {
        let proxy = zbus::Proxy::new(&self.connection, NM_SERVICE, NM_PATH, NM_SERVICE).await?;

        let state: u32 = proxy
            .get_property("State")
            .await
            .map_err(|e| NetworkMonitorError::QueryFailed(e.to_string()))?;

        Ok(NetworkEvent::from_nm_state(state) == NetworkEvent::NetworkUp)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkMonitorError {
    #[error("D-Bus connection failed: {0}")]
    DBusConnectionFailed(#[from] zbus::Error),

    #[error("NetworkManager not available")]
    NetworkManagerUnavailable,

    #[error("Failed to query network state: {0}")]
    QueryFailed(String),
}
