//! Availability checker contract
//!
//! A checker knows how to build one protocol's synthetic handshake and
//! send it to a single port. Fanning out over ports, aggregating replies
//! and the first-to-respond race are shared by every protocol and live in
//! the trait's provided methods.

use crate::protocol::VpnProtocol;
use crate::server::ServerIp;
use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::seq::SliceRandom;
use std::time::Duration;
use tracing::debug;

/// Outcome of probing one protocol on one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityResult {
    Unavailable,
    Available { ports: Vec<u16> },
}

impl AvailabilityResult {
    pub fn ports(&self) -> &[u16] {
        match self {
            AvailabilityResult::Unavailable => &[],
            AvailabilityResult::Available { ports } => ports,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.ports().is_empty()
    }
}

#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    fn vpn_protocol(&self) -> VpnProtocol;

    /// Ports probed when the server publishes no override
    fn default_ports(&self) -> Vec<u16>;

    /// Upper bound for a single `ping`
    fn timeout(&self) -> Duration;

    /// Send one probe to `port` and report whether anything came back
    ///
    /// Malformed setups (bad key, unsupported server) report `false`.
    async fn ping(&self, server: &ServerIp, port: u16) -> bool;

    /// Server override ports for this protocol, else the defaults
    fn candidate_ports(&self, server: &ServerIp) -> Vec<u16> {
        server
            .override_ports(self.vpn_protocol())
            .map(<[u16]>::to_vec)
            .unwrap_or_else(|| self.default_ports())
    }

    /// Probe every candidate port concurrently and collect the responders
    async fn check_availability(&self, server: &ServerIp) -> AvailabilityResult {
        let mut ports = self.candidate_ports(server);
        ports.shuffle(&mut rand::thread_rng());

        let timeout = self.timeout();
        let probes = ports.iter().map(|&port| async move {
            let alive = tokio::time::timeout(timeout, self.ping(server, port))
                .await
                .unwrap_or(false);
            (port, alive)
        });

        let available: Vec<u16> = join_all(probes)
            .await
            .into_iter()
            .filter_map(|(port, alive)| alive.then_some(port))
            .collect();

        debug!(
            protocol = %self.vpn_protocol(),
            server = %server.domain,
            ports = ?available,
            "Availability check finished"
        );

        if available.is_empty() {
            AvailabilityResult::Unavailable
        } else {
            AvailabilityResult::Available { ports: available }
        }
    }

    /// Race every candidate port and return the first one that answers
    async fn first_to_respond(&self, server: &ServerIp) -> Option<u16> {
        let mut ports = self.candidate_ports(server);
        ports.shuffle(&mut rand::thread_rng());

        let timeout = self.timeout();
        let mut pending: FuturesUnordered<_> = ports
            .into_iter()
            .map(|port| async move {
                let alive = tokio::time::timeout(timeout, self.ping(server, port))
                    .await
                    .unwrap_or(false);
                (port, alive)
            })
            .collect();

        while let Some((port, alive)) = pending.next().await {
            if alive {
                debug!(protocol = %self.vpn_protocol(), port, "First port to respond");
                return Some(port);
            }
        }
        None
    }
}
