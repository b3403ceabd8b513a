//! Integration tests for per-protocol port selection
//!
//! Time is paused so the WireGuard retry delay can be observed exactly.

use async_trait::async_trait;
use smartvpn_core::protocol::{OpenVpnTransport, VpnProtocol, WireGuardTransport};
use smartvpn_core::server::{ProtocolEntry, ServerIp};
use smartvpn_core::smart::{AvailabilityChecker, AvailabilityCheckerResolver, SmartPortSelector};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const WG_UDP: VpnProtocol = VpnProtocol::WireGuard(WireGuardTransport::Udp);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Checker whose ports start answering after a number of pings
struct CountingChecker {
    protocol: VpnProtocol,
    ports: Vec<u16>,
    /// Ports that answer once enabled
    responsive: Vec<u16>,
    /// Pings that fail before any port answers
    silent_pings: usize,
    /// Per-port answer delay in milliseconds, by position in `ports`
    stagger_ms: u64,
    pings: AtomicUsize,
}

impl CountingChecker {
    fn new(protocol: VpnProtocol, responsive: Vec<u16>, silent_pings: usize) -> Self {
        Self {
            protocol,
            ports: vec![51820, 88, 1224, 500],
            responsive,
            silent_pings,
            stagger_ms: 0,
            pings: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AvailabilityChecker for CountingChecker {
    fn vpn_protocol(&self) -> VpnProtocol {
        self.protocol
    }

    fn default_ports(&self) -> Vec<u16> {
        self.ports.clone()
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(500)
    }

    async fn ping(&self, _server: &ServerIp, port: u16) -> bool {
        let seen = self.pings.fetch_add(1, Ordering::SeqCst);
        let position = self.ports.iter().position(|p| *p == port).unwrap_or(0) as u64;
        tokio::time::sleep(Duration::from_millis(10 + position * self.stagger_ms)).await;
        seen >= self.silent_pings && self.responsive.contains(&port)
    }
}

struct SingleResolver(Arc<CountingChecker>);

impl AvailabilityCheckerResolver for SingleResolver {
    fn availability_checker(&self, _protocol: VpnProtocol) -> Arc<dyn AvailabilityChecker> {
        self.0.clone()
    }
}

fn selector(checker: &Arc<CountingChecker>) -> SmartPortSelector {
    SmartPortSelector::new(Arc::new(SingleResolver(checker.clone())), RETRY_DELAY)
}

fn server() -> ServerIp {
    ServerIp {
        id: "srv-2".to_string(),
        entry_ip: Some("198.51.100.7".to_string()),
        exit_ip: "198.51.100.8".to_string(),
        domain: "node-se-04.example.net".to_string(),
        status: 1,
        label: None,
        x25519_public_key: None,
        protocol_entries: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_wireguard_returns_single_responding_port() {
    // Given: only port 1224 answers
    let checker = Arc::new(CountingChecker::new(WG_UDP, vec![1224], 0));

    // When: the best WireGuard port is determined
    let ports = selector(&checker).determine_best_port(WG_UDP, &server()).await;

    // Then: exactly that port comes back after a single round
    assert_eq!(ports, vec![1224]);
    assert_eq!(checker.pings.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_wireguard_prefers_fastest_port() {
    // Given: every port answers but later ports answer slower
    let mut checker = CountingChecker::new(WG_UDP, vec![51820, 88, 1224, 500], 0);
    checker.stagger_ms = 50;
    let checker = Arc::new(checker);

    // When: the best WireGuard port is determined
    let ports = selector(&checker).determine_best_port(WG_UDP, &server()).await;

    // Then: the first port in the list, which answers fastest, wins
    assert_eq!(ports, vec![51820]);
}

#[tokio::test(start_paused = true)]
async fn test_wireguard_retries_once_after_delay() {
    // Given: the whole first round goes unanswered
    let checker = Arc::new(CountingChecker::new(WG_UDP, vec![88], 4));
    let start = Instant::now();

    // When: the best WireGuard port is determined
    let ports = selector(&checker).determine_best_port(WG_UDP, &server()).await;

    // Then: the retry round finds the port after waiting the retry delay
    assert_eq!(ports, vec![88]);
    assert_eq!(checker.pings.load(Ordering::SeqCst), 8);
    assert!(start.elapsed() >= RETRY_DELAY);
}

#[tokio::test(start_paused = true)]
async fn test_wireguard_gives_up_with_empty_list() {
    // Given: nothing ever answers
    let checker = Arc::new(CountingChecker::new(WG_UDP, vec![], 0));

    // When: the best WireGuard port is determined
    let ports = selector(&checker).determine_best_port(WG_UDP, &server()).await;

    // Then: two rounds ran and no guess is made
    assert!(ports.is_empty());
    assert_eq!(checker.pings.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_other_protocols_shuffle_without_probing() {
    // Given: an OpenVPN UDP checker
    let protocol = VpnProtocol::OpenVpn(OpenVpnTransport::Udp);
    let checker = Arc::new(CountingChecker::new(protocol, vec![], 0));

    // When: the best port list is determined
    let mut ports = selector(&checker).determine_best_port(protocol, &server()).await;

    // Then: every default port comes back and none was pinged
    ports.sort_unstable();
    assert_eq!(ports, vec![88, 500, 1224, 51820]);
    assert_eq!(checker.pings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_server_port_overrides_replace_defaults() {
    // Given: a server overriding IKEv2 ports
    let checker = Arc::new(CountingChecker::new(VpnProtocol::Ike, vec![], 0));
    let mut server = server();
    let mut entries = BTreeMap::new();
    entries.insert(
        "IKEv2".to_string(),
        Some(ProtocolEntry {
            ipv4: Some("198.51.100.9".to_string()),
            ports: Some(vec![4500, 500]),
        }),
    );
    server.protocol_entries = Some(entries);

    // When: the best port list is determined
    let mut ports = selector(&checker)
        .determine_best_port(VpnProtocol::Ike, &server)
        .await;

    // Then: only the override ports are offered
    ports.sort_unstable();
    assert_eq!(ports, vec![500, 4500]);
}
