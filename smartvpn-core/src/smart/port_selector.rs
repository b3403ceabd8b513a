//! Port selection for a protocol already chosen
//!
//! WireGuard UDP ports are verified live: the first port to answer wins,
//! with a single delayed retry. A dead WireGuard port breaks the local
//! agent silently, so an empty list is returned rather than a guess. All
//! other protocols connect-and-retry on their own and just get their
//! candidate ports in random order.

use super::resolver::AvailabilityCheckerResolver;
use crate::protocol::{VpnProtocol, WireGuardTransport};
use crate::server::ServerIp;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct SmartPortSelector {
    resolver: Arc<dyn AvailabilityCheckerResolver>,
    retry_delay: Duration,
}

impl SmartPortSelector {
    pub fn new(resolver: Arc<dyn AvailabilityCheckerResolver>, retry_delay: Duration) -> Self {
        Self {
            resolver,
            retry_delay,
        }
    }

    #[instrument(skip(self, server), fields(server = %server.domain))]
    pub async fn determine_best_port(&self, protocol: VpnProtocol, server: &ServerIp) -> Vec<u16> {
        let checker = self.resolver.availability_checker(protocol);

        if protocol != VpnProtocol::WireGuard(WireGuardTransport::Udp) {
            let mut ports = checker.candidate_ports(server);
            ports.shuffle(&mut rand::thread_rng());
            return ports;
        }

        if let Some(port) = checker.first_to_respond(server).await {
            return vec![port];
        }

        info!(
            delay_ms = self.retry_delay.as_millis() as u64,
            "No WireGuard port responded, retrying once"
        );
        tokio::time::sleep(self.retry_delay).await;

        match checker.first_to_respond(server).await {
            Some(port) => vec![port],
            None => {
                warn!("No WireGuard port responded after retry");
                Vec::new()
            }
        }
    }
}
