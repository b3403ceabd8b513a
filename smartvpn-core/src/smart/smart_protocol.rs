//! Best protocol negotiation for one server
//!
//! Every enabled protocol the server supports is probed in parallel. The
//! winner is the responder with the lowest platform priority, so the
//! outcome depends only on *which* protocols answered, never on the order
//! their answers arrived in.

use super::checker::AvailabilityChecker;
use super::resolver::AvailabilityCheckerResolver;
use crate::config::SmartProtocolConfig;
use crate::protocol::{Platform, VpnProtocol, WireGuardTransport};
use crate::server::ServerIp;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

pub struct SmartProtocol {
    platform: Platform,
    checkers: Vec<Arc<dyn AvailabilityChecker>>,
    fallback: (VpnProtocol, Vec<u16>),
}

impl SmartProtocol {
    /// Build the checker set once from the enabled protocol families
    pub fn new(
        config: &SmartProtocolConfig,
        platform: Platform,
        resolver: &dyn AvailabilityCheckerResolver,
    ) -> Self {
        let checkers: Vec<Arc<dyn AvailabilityChecker>> = config
            .enabled_protocols()
            .into_iter()
            .map(|protocol| resolver.availability_checker(protocol))
            .collect();

        let fallback = checkers
            .iter()
            .min_by_key(|checker| checker.vpn_protocol().priority(platform))
            .map(|checker| (checker.vpn_protocol(), checker.default_ports()))
            .unwrap_or_else(|| {
                let protocol = platform_default(platform);
                (protocol, resolver.availability_checker(protocol).default_ports())
            });

        debug!(
            checkers = checkers.len(),
            fallback = %fallback.0,
            "Smart protocol configured"
        );

        Self {
            platform,
            checkers,
            fallback,
        }
    }

    /// Protocol and ports used when nothing responds
    pub fn fallback(&self) -> (VpnProtocol, &[u16]) {
        (self.fallback.0, &self.fallback.1)
    }

    #[instrument(skip(self, server), fields(server = %server.domain))]
    pub async fn determine_best_protocol(&self, server: &ServerIp) -> (VpnProtocol, Vec<u16>) {
        if self.checkers.is_empty() {
            info!(protocol = %self.fallback.0, "No protocols enabled, using fallback");
            return self.fallback.clone();
        }

        let server = Arc::new(server.clone());
        let mut probes = JoinSet::new();
        for checker in &self.checkers {
            let protocol = checker.vpn_protocol();
            if !server.supports(protocol) {
                debug!(%protocol, "Server does not support protocol, skipping");
                continue;
            }
            let checker = Arc::clone(checker);
            let server = Arc::clone(&server);
            probes.spawn(async move { (protocol, checker.check_availability(&server).await) });
        }

        let mut available = BTreeMap::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((protocol, result)) if result.is_available() => {
                    available.insert(protocol, result.ports().to_vec());
                }
                Ok((protocol, _)) => debug!(%protocol, "Protocol unavailable"),
                Err(e) => warn!("Availability check task failed: {}", e),
            }
        }

        match available
            .into_iter()
            .min_by_key(|(protocol, _)| protocol.priority(self.platform))
        {
            Some((protocol, ports)) => {
                info!(%protocol, ?ports, "Best protocol determined");
                (protocol, ports)
            }
            None => {
                warn!(protocol = %self.fallback.0, "No protocol responded, using fallback");
                self.fallback.clone()
            }
        }
    }
}

fn platform_default(platform: Platform) -> VpnProtocol {
    match platform {
        Platform::Ios => VpnProtocol::WireGuard(WireGuardTransport::Udp),
        Platform::Macos => VpnProtocol::Ike,
    }
}
