//! smartvpn - VPN protocol negotiation CLI
//!
//! Probes a VPN server over IKEv2, OpenVPN and WireGuard to find the best
//! reachable protocol and ports for this client.

use clap::{Parser, Subcommand};
use smartvpn_core::error::SmartVpnError;
use smartvpn_core::protocol::VpnProtocol;
use smartvpn_core::{init_logging, LevelFilter};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "smartvpn")]
#[command(about = "Pick the best reachable VPN protocol and port for a server")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Determine the best protocol and ports for a server
    Protocol {
        /// Server descriptor (JSON)
        server: PathBuf,
    },
    /// Determine the best ports of one protocol
    Port {
        /// Protocol, e.g. wireguard-udp or openvpn-tcp
        protocol: VpnProtocol,
        /// Server descriptor (JSON)
        server: PathBuf,
    },
    /// Probe every candidate port of one protocol
    Check {
        /// Protocol, e.g. ikev2 or wireguard-tls
        protocol: VpnProtocol,
        /// Server descriptor (JSON)
        server: PathBuf,
    },
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    if let Err(e) = init_logging(level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let result = match cli.command {
        Commands::Protocol { server } => cli::probe::run_protocol(&server).await,
        Commands::Port { protocol, server } => cli::probe::run_port(protocol, &server).await,
        Commands::Check { protocol, server } => cli::probe::run_check(protocol, &server).await,
        Commands::InitConfig { force } => cli::init::run_init_config(force),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration and input errors (exit code 2)
                SmartVpnError::Config(_)
                | SmartVpnError::Toml(_)
                | SmartVpnError::TomlSerialize(_)
                | SmartVpnError::Json(_)
                | SmartVpnError::Probe(_) => 2,
                // Credential storage (exit code 2 for setup issues)
                SmartVpnError::Keyring(_) => 2,
                // Runtime failures (exit code 1)
                SmartVpnError::LocalAgent(_)
                | SmartVpnError::Authentication(_)
                | SmartVpnError::ProviderMessage(_)
                | SmartVpnError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
