//! init-config command

use colored::Colorize;
use smartvpn_core::config::toml_config::{config_exists, get_config_path, save_config_to_path};
use smartvpn_core::config::ClientConfig;
use smartvpn_core::error::SmartVpnError;

/// Write the default configuration unless one exists
pub fn run_init_config(force: bool) -> Result<(), SmartVpnError> {
    let path = get_config_path()?;

    if config_exists()? && !force {
        println!(
            "{} Configuration already exists at {}",
            "!".yellow(),
            path.display()
        );
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    save_config_to_path(&ClientConfig::default(), &path)?;
    println!("{} Wrote default configuration to {}", "✓".green(), path.display());
    Ok(())
}
