//! Core library for the smartvpn client
//!
//! This crate picks the best VPN protocol and ports for a server, manages
//! the local agent control channel once the tunnel is up and keeps the
//! client certificate it authenticates with fresh.

pub mod error;
pub mod types;

pub mod agent;
pub mod auth;
pub mod config;
pub mod protocol;
pub mod server;
pub mod smart;

pub use tracing_subscriber::filter::LevelFilter;

/// Initialize logging infrastructure
///
/// Sets up tracing with systemd journal logging when running under systemd.
/// Otherwise logs to stderr with pretty formatting.
pub fn init_logging(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(level)
                .init();
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
        .with(level)
        .init();

    Ok(())
}
