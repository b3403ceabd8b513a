//! TOML configuration file I/O
//!
//! Handles loading and saving the client configuration to/from TOML files
//! in the user's configuration directory.

use crate::config::ClientConfig;
use crate::error::{ConfigError, SmartVpnError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns ~/.config/smartvpn, or SMARTVPN_CONFIG_DIR if set
pub fn get_config_dir() -> Result<PathBuf, SmartVpnError> {
    if let Ok(config_dir) = std::env::var("SMARTVPN_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        SmartVpnError::Config(ConfigError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;

    Ok(PathBuf::from(home).join(".config").join("smartvpn"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, SmartVpnError> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the configuration from the default file
///
/// A missing file yields the built-in defaults.
pub fn load_config() -> Result<ClientConfig, SmartVpnError> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        debug!(path = ?config_path, "No configuration file, using defaults");
        return Ok(ClientConfig::default());
    }
    load_config_from_path(&config_path)
}

/// Load and validate the configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<ClientConfig, SmartVpnError> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SmartVpnError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => SmartVpnError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config: ClientConfig = toml::from_str(&contents)?;

    config.validate().map_err(|e| {
        warn!("Configuration validation failed: {}", e);
        ConfigError::Validation(e)
    })?;

    info!(
        platform = ?config.client.platform,
        probe_timeout_ms = config.probe.timeout_ms,
        agent_host = %config.local_agent.host,
        "Loaded configuration"
    );

    Ok(config)
}

/// Save the configuration to a specific TOML file
pub fn save_config_to_path<P: AsRef<Path>>(
    config: &ClientConfig,
    path: P,
) -> Result<(), SmartVpnError> {
    config.validate().map_err(ConfigError::Validation)?;

    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            SmartVpnError::Config(ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })
        })?;
    }

    let contents = toml::to_string_pretty(config)?;

    std::fs::write(&path, contents).map_err(|_e| {
        SmartVpnError::Config(ConfigError::SaveFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        })
    })?;

    info!("Saved configuration to {:?}", path.as_ref());
    Ok(())
}

/// Check if a configuration file exists
pub fn config_exists() -> Result<bool, SmartVpnError> {
    Ok(get_config_path()?.exists())
}
