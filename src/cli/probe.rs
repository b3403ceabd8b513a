//! Probing commands
//!
//! Each command loads the configuration and a server descriptor, then runs
//! one negotiation step against the live server.

use colored::Colorize;
use smartvpn_core::config::toml_config::load_config;
use smartvpn_core::config::ClientConfig;
use smartvpn_core::error::SmartVpnError;
use smartvpn_core::protocol::VpnProtocol;
use smartvpn_core::server::ServerIp;
use smartvpn_core::smart::{
    AvailabilityCheckerResolver, DefaultCheckerResolver, SmartPortSelector, SmartProtocol,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

fn load(server_path: &Path) -> Result<(ClientConfig, ServerIp), SmartVpnError> {
    let config = load_config()?;
    let server = ServerIp::from_path(server_path)?;
    info!(server = %server.domain, entry_ip = ?server.entry_ip, "Loaded server descriptor");

    if server.is_under_maintenance() {
        warn!(server = %server.domain, "Server is under maintenance");
        println!("{} {} is under maintenance", "!".yellow(), server.domain);
    }

    Ok((config, server))
}

fn format_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run the protocol command
pub async fn run_protocol(server_path: &Path) -> Result<(), SmartVpnError> {
    let (config, server) = load(server_path)?;
    let resolver = DefaultCheckerResolver::new(&config);
    let smart = SmartProtocol::new(&config.smart_protocol, config.client.platform, &resolver);

    println!("Probing {} ...", server.domain.bold());
    let (protocol, ports) = smart.determine_best_protocol(&server).await;

    println!(
        "{} {} on ports {}",
        "✓".green(),
        protocol.to_string().bold(),
        format_ports(&ports)
    );
    Ok(())
}

/// Run the port command
pub async fn run_port(protocol: VpnProtocol, server_path: &Path) -> Result<(), SmartVpnError> {
    let (config, server) = load(server_path)?;
    let selector = SmartPortSelector::new(
        Arc::new(DefaultCheckerResolver::new(&config)),
        config.probe.retry_delay(),
    );

    let ports = selector.determine_best_port(protocol, &server).await;
    if ports.is_empty() {
        println!("{} no {} port answered", "✗".red(), protocol);
    } else {
        println!("{} {} ports: {}", "✓".green(), protocol, format_ports(&ports));
    }
    Ok(())
}

/// Run the check command
pub async fn run_check(protocol: VpnProtocol, server_path: &Path) -> Result<(), SmartVpnError> {
    let (config, server) = load(server_path)?;
    if !server.supports(protocol) {
        println!("{} {} does not offer {}", "✗".red(), server.domain, protocol);
        return Ok(());
    }

    let checker = DefaultCheckerResolver::new(&config).availability_checker(protocol);
    let candidates = checker.candidate_ports(&server);
    let result = checker.check_availability(&server).await;

    for port in candidates {
        let status = if result.ports().contains(&port) {
            "open".green()
        } else {
            "silent".red()
        };
        println!("  {:>5}  {}", port, status);
    }

    if result.is_available() {
        println!("{} {} is available", "✓".green(), protocol);
    } else {
        println!("{} {} is unavailable", "✗".red(), protocol);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ports() {
        assert_eq!(format_ports(&[443, 1194]), "443, 1194");
        assert_eq!(format_ports(&[]), "");
    }
}
