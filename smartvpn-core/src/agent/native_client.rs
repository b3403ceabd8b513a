//! Callback surface handed to the transport
//!
//! The transport calls these from its own threads. Every callback is turned
//! into a `NativeEvent` and queued so the agent handles them one at a time.

use super::connection::{ConnectionDetails, FeatureStatistics, StatusMessage};
use super::state::LocalAgentState;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    /// `None` when the transport reported a state string we do not know
    State(Option<LocalAgentState>),
    Error { code: i64, description: String },
    ConnectionDetails(ConnectionDetails),
    FeatureStatistics(FeatureStatistics),
}

#[derive(Debug, Clone)]
pub struct NativeClient {
    tx: mpsc::UnboundedSender<NativeEvent>,
}

impl NativeClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NativeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn log(&self, text: &str) {
        debug!(target: "local_agent", "{}", text);
    }

    pub fn on_state(&self, state: &str) {
        let parsed = LocalAgentState::from_transport(state);
        if parsed.is_none() {
            debug!(state, "Unknown local agent state");
        }
        self.push(NativeEvent::State(parsed));
    }

    pub fn on_error(&self, code: i64, description: &str) {
        self.push(NativeEvent::Error {
            code,
            description: description.to_string(),
        });
    }

    /// Split a status push into its details and statistics parts
    pub fn on_status_update(&self, status: &StatusMessage) {
        if let Some(details) = &status.connection_details {
            self.push(NativeEvent::ConnectionDetails(details.clone()));
        }
        if let Some(statistics) = &status.feature_statistics {
            self.push(NativeEvent::FeatureStatistics(statistics.clone()));
        }
    }

    pub fn on_tls_session_started(&self) {
        info!("Local agent TLS session started");
    }

    pub fn on_tls_session_ended(&self) {
        info!("Local agent TLS session ended");
    }

    fn push(&self, event: NativeEvent) {
        if self.tx.send(event).is_err() {
            debug!("Local agent event dropped, receiver closed");
        }
    }
}
