//! Local agent control channel state machine
//!
//! Owns at most one transport connection, turns transport callbacks into
//! `LocalAgentEvent`s and drives NetShield statistics polling.

use super::connection::{ConnectionParams, LocalAgentConnection, LocalAgentConnectionFactory};
use super::event::LocalAgentEvent;
use super::features::{LocalAgentConfiguration, LocalAgentFeatures, NatType, NetShieldModel, NetShieldType};
use super::native_client::{NativeClient, NativeEvent};
use super::network_monitor::{NetworkEvent, NetworkMonitor, NetworkMonitorError};
use super::state::LocalAgentState;
use crate::auth::VpnAuthenticationData;
use crate::config::{FeatureFlags, LocalAgentSettings};
use crate::error::LocalAgentError;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// User settings the agent reacts to while running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentPreferences {
    pub netshield: NetShieldType,
    pub flags: FeatureFlags,
}

impl AgentPreferences {
    fn wants_statistics(&self) -> bool {
        self.flags.netshield_stats && self.netshield == NetShieldType::Level2
    }
}

pub struct LocalAgent {
    inner: Arc<Inner>,
    preferences_watcher: JoinHandle<()>,
}

struct Inner {
    factory: Arc<dyn LocalAgentConnectionFactory>,
    settings: LocalAgentSettings,
    preferences: watch::Receiver<AgentPreferences>,
    events: mpsc::UnboundedSender<LocalAgentEvent>,
    connection: Mutex<Option<Arc<dyn LocalAgentConnection>>>,
    previous_state: Mutex<Option<LocalAgentState>>,
    event_pump: Mutex<Option<JoinHandle<()>>>,
    statistics_timer: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalAgent {
    /// Create an agent and the stream of events it publishes
    ///
    /// Must be called from within a tokio runtime. Preference changes sent
    /// on the watch channel start or stop statistics polling.
    pub fn new(
        factory: Arc<dyn LocalAgentConnectionFactory>,
        settings: LocalAgentSettings,
        preferences: watch::Receiver<AgentPreferences>,
    ) -> (Self, mpsc::UnboundedReceiver<LocalAgentEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            factory,
            settings,
            preferences: preferences.clone(),
            events,
            connection: Mutex::new(None),
            previous_state: Mutex::new(None),
            event_pump: Mutex::new(None),
            statistics_timer: Mutex::new(None),
        });

        let preferences_watcher = tokio::spawn(watch_preferences(Arc::downgrade(&inner), preferences));

        (
            Self {
                inner,
                preferences_watcher,
            },
            events_rx,
        )
    }

    /// Open a new control channel, replacing any existing one
    ///
    /// Construction failures are logged; no event is published for them.
    #[instrument(skip(self, data, configuration), fields(hostname = %configuration.hostname))]
    pub fn connect(&self, data: &VpnAuthenticationData, configuration: &LocalAgentConfiguration) {
        if let Some(pump) = lock(&self.inner.event_pump).take() {
            pump.abort();
        }
        self.inner.close_connection();
        *lock(&self.inner.previous_state) = None;

        let client_key_pem = match data.client_key_pem() {
            Ok(pem) => pem,
            Err(e) => {
                error!("Failed to prepare client key for local agent: {}", e);
                return;
            }
        };
        let server_ca_pem = match self.inner.settings.load_server_ca() {
            Ok(pem) => pem,
            Err(e) => {
                error!("Failed to read local agent CA bundle: {}", e);
                return;
            }
        };
        if server_ca_pem.is_empty() {
            warn!(
                host = %self.inner.settings.host,
                "No local agent CA bundle configured, server certificate cannot be verified"
            );
        }

        let params = ConnectionParams {
            client_certificate_pem: data.client_certificate.clone(),
            client_key_pem,
            server_ca_pem,
            host: self.inner.settings.host.clone(),
            cert_server_name: self
                .inner
                .settings
                .cert_server_name
                .clone()
                .unwrap_or_else(|| configuration.hostname.clone()),
            features: LocalAgentFeatures::from_connection_features(&configuration.features),
            connectivity: true,
        };

        info!(host = %params.host, "Connecting to local agent");
        let (client, native_events) = NativeClient::new();
        match self.inner.factory.make_connection(params, client) {
            Ok(connection) => {
                *lock(&self.inner.connection) = Some(connection);
                let pump = tokio::spawn(pump_events(Arc::downgrade(&self.inner), native_events));
                *lock(&self.inner.event_pump) = Some(pump);
            }
            Err(e) => error!("Failed to create local agent connection: {}", e),
        }
    }

    /// Close the channel and publish zeroed statistics
    #[instrument(skip(self))]
    pub fn disconnect(&self) {
        info!("Disconnecting local agent");
        self.inner.close_connection();
        self.inner.stop_monitoring();
        self.inner
            .emit(LocalAgentEvent::NetShieldStats(NetShieldModel::zero()));
    }

    pub fn update_netshield(&self, level: NetShieldType) {
        self.push_features(LocalAgentFeatures::default().with_netshield(level));
    }

    pub fn update_vpn_accelerator(&self, enabled: bool) {
        self.push_features(LocalAgentFeatures::default().with_vpn_accelerator(enabled));
    }

    pub fn update_nat_type(&self, nat_type: NatType) {
        self.push_features(LocalAgentFeatures::default().with_nat_type(nat_type));
    }

    pub fn update_safe_mode(&self, safe_mode: bool) {
        self.push_features(LocalAgentFeatures::default().with_safe_mode(safe_mode));
    }

    /// Ask the server to lift a soft jail
    pub fn unjail(&self) {
        self.push_features(LocalAgentFeatures::default().with_jailed(false));
    }

    pub fn request_status(&self, with_statistics: bool) {
        match self.inner.current_connection() {
            Some(connection) => connection.send_get_status(with_statistics),
            None => debug!("No local agent connection, status request skipped"),
        }
    }

    /// State currently reported by the transport
    pub fn state(&self) -> Option<LocalAgentState> {
        self.inner
            .current_connection()
            .and_then(|connection| LocalAgentState::from_transport(&connection.state()))
    }

    pub fn is_monitoring_feature_statistics(&self) -> bool {
        lock(&self.inner.statistics_timer)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Follow NetworkManager and logind on the system bus
    ///
    /// Fails when the bus or NetworkManager is unavailable; the agent keeps
    /// working without reachability hints in that case.
    pub async fn monitor_reachability(&self) -> Result<JoinHandle<()>, NetworkMonitorError> {
        let monitor = NetworkMonitor::new().await?;
        match monitor.is_network_available().await {
            Ok(available) => info!(available, "Network reachability monitoring started"),
            Err(e) => warn!("Initial network state unknown: {}", e),
        }
        let events = monitor.start().await?;
        Ok(self.watch_reachability(events))
    }

    /// Restore connectivity on the channel whenever the network comes back
    pub fn watch_reachability(&self, mut network_events: mpsc::UnboundedReceiver<NetworkEvent>) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = network_events.recv().await {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                match event {
                    NetworkEvent::NetworkUp | NetworkEvent::SystemResumed => {
                        if let Some(connection) = inner.current_connection() {
                            debug!(?event, "Network reachable, restoring agent connectivity");
                            connection.set_connectivity(true);
                        }
                    }
                    NetworkEvent::NetworkDown => debug!("Network unreachable"),
                }
            }
        })
    }

    fn push_features(&self, features: LocalAgentFeatures) {
        match self.inner.current_connection() {
            Some(connection) => {
                debug!(?features, "Pushing feature update to local agent");
                connection.set_features(features);
            }
            None => debug!("No local agent connection, feature update skipped"),
        }
    }
}

impl Drop for LocalAgent {
    fn drop(&mut self) {
        self.preferences_watcher.abort();
        if let Some(pump) = lock(&self.inner.event_pump).take() {
            pump.abort();
        }
        self.inner.stop_monitoring();
    }
}

impl Inner {
    fn current_connection(&self) -> Option<Arc<dyn LocalAgentConnection>> {
        lock(&self.connection).clone()
    }

    fn close_connection(&self) {
        let connection = lock(&self.connection).take();
        if let Some(connection) = connection {
            connection.close();
        }
    }

    fn emit(&self, event: LocalAgentEvent) {
        if self.events.send(event).is_err() {
            debug!("Local agent event dropped, no listener");
        }
    }

    fn handle_native_event(self: &Arc<Self>, event: NativeEvent) {
        let flags = self.preferences.borrow().flags;
        match event {
            NativeEvent::State(None) => {}
            NativeEvent::State(Some(state)) => self.handle_state(state),
            NativeEvent::Error { code, description } => match LocalAgentError::from_code(code) {
                Some(error) => {
                    warn!(code, %error, "Local agent reported an error");
                    self.emit(LocalAgentEvent::Error(error));
                }
                None => warn!(code, %description, "Unknown local agent error"),
            },
            NativeEvent::ConnectionDetails(details) => {
                if flags.connection_details {
                    self.emit(LocalAgentEvent::ConnectionDetails(details));
                }
            }
            NativeEvent::FeatureStatistics(statistics) => {
                if flags.netshield_stats {
                    self.emit(LocalAgentEvent::NetShieldStats(NetShieldModel::from(&statistics)));
                }
            }
        }
    }

    fn handle_state(self: &Arc<Self>, state: LocalAgentState) {
        let previous = lock(&self.previous_state).replace(state);

        if previous == Some(state) {
            debug!(%state, "Local agent state unchanged");
        } else {
            info!(%state, "Local agent state changed");
            self.emit(LocalAgentEvent::StateChanged(state));
        }

        if state != LocalAgentState::Connected {
            return;
        }

        // The server echoes back the features sent on connect.
        if previous == Some(LocalAgentState::Connecting) {
            debug!("Ignoring features reported right after connecting");
            self.toggle_monitoring();
            return;
        }

        let features = self
            .current_connection()
            .and_then(|connection| connection.status())
            .and_then(|status| status.features)
            .and_then(|features| features.vpn_features());
        if let Some(features) = features {
            self.emit(LocalAgentEvent::Features(features));
        }
    }

    fn toggle_monitoring(self: &Arc<Self>) {
        let preferences = *self.preferences.borrow();
        if preferences.wants_statistics() {
            self.start_monitoring();
        } else {
            self.stop_monitoring();
        }
    }

    fn start_monitoring(self: &Arc<Self>) {
        let mut timer = lock(&self.statistics_timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let interval = self.settings.statistics_interval();
        let leeway_ms = self.settings.statistics_leeway_secs * 1000;
        let inner = Arc::downgrade(self);
        info!(interval_secs = interval.as_secs(), "Starting NetShield statistics polling");

        *timer = Some(tokio::spawn(async move {
            loop {
                {
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    if let Some(connection) = inner.current_connection() {
                        connection.send_get_status(true);
                    }
                }

                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=leeway_ms));
                tokio::time::sleep(interval + jitter).await;
            }
        }));
    }

    fn stop_monitoring(&self) {
        if let Some(timer) = lock(&self.statistics_timer).take() {
            info!("Stopping NetShield statistics polling");
            timer.abort();
        }
    }
}

async fn watch_preferences(inner: Weak<Inner>, mut preferences: watch::Receiver<AgentPreferences>) {
    while preferences.changed().await.is_ok() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.toggle_monitoring();
    }
}

async fn pump_events(inner: Weak<Inner>, mut native_events: mpsc::UnboundedReceiver<NativeEvent>) {
    while let Some(event) = native_events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_native_event(event);
    }
}
