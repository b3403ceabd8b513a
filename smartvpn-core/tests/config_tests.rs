//! Integration tests for configuration files on disk

use smartvpn_core::config::toml_config::{load_config_from_path, save_config_to_path};
use smartvpn_core::config::ClientConfig;
use smartvpn_core::error::{ConfigError, ConfigValidationError, SmartVpnError};
use smartvpn_core::protocol::{Platform, VpnProtocol};
use std::time::Duration;
use tempfile::TempDir;

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

fn validation_error(result: Result<ClientConfig, SmartVpnError>) -> ConfigValidationError {
    match result {
        Err(SmartVpnError::Config(ConfigError::Validation(e))) => e,
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn test_partial_file_keeps_defaults() {
    // Given: a file that only touches a few settings
    let (_dir, path) = write_config(
        r#"
[client]
platform = "ios"

[smart_protocol]
openvpn = false

[probe]
timeout_ms = 1500

[local_agent]
cert_server_name = "agent.example.net"

[features]
connection_details = true
"#,
    );

    // When: loading it
    let config = load_config_from_path(&path).unwrap();

    // Then: the given values apply and everything else is default
    assert_eq!(config.client.platform, Platform::Ios);
    assert!(!config.smart_protocol.openvpn);
    assert!(config.smart_protocol.wireguard_tls);
    assert_eq!(config.probe.timeout(), Duration::from_millis(1500));
    assert_eq!(config.probe.retry_delay(), Duration::from_secs(1));
    assert_eq!(config.local_agent.host, "10.2.0.1:65432");
    assert_eq!(
        config.local_agent.cert_server_name.as_deref(),
        Some("agent.example.net")
    );
    assert!(config.features.connection_details);
    assert!(config.features.netshield_stats);
    assert_eq!(config.default_ports(VpnProtocol::Ike), vec![500]);
    assert!(!config
        .smart_protocol
        .enabled_protocols()
        .iter()
        .any(|p| matches!(p, VpnProtocol::OpenVpn(_))));
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let (_dir, path) = write_config("[wireguard]\nudp_ports = []\n");
    assert_eq!(
        validation_error(load_config_from_path(&path)),
        ConfigValidationError::EmptyPorts("wireguard-udp".to_string())
    );

    let (_dir, path) = write_config("[probe]\ntimeout_ms = 0\n");
    assert_eq!(
        validation_error(load_config_from_path(&path)),
        ConfigValidationError::InvalidProbeTimeout(0)
    );

    let (_dir, path) = write_config("[local_agent]\nstatistics_leeway_secs = 60\n");
    assert_eq!(
        validation_error(load_config_from_path(&path)),
        ConfigValidationError::LeewayTooLarge {
            leeway: 60,
            interval: 60
        }
    );

    let (_dir, path) = write_config("[local_agent]\nhost = \"10.2.0.1\"\n");
    assert_eq!(
        validation_error(load_config_from_path(&path)),
        ConfigValidationError::InvalidAgentHost("10.2.0.1".to_string())
    );
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let (_dir, path) = write_config("[probe\ntimeout_ms = ");

    let result = load_config_from_path(&path);

    assert!(matches!(result, Err(SmartVpnError::Toml(_))));
}

#[test]
fn test_invalid_config_is_not_saved() {
    // Given: a configuration with an out of range retry delay
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = ClientConfig::default();
    config.probe.wireguard_retry_delay_ms = 60_000;

    // When: saving it
    let result = save_config_to_path(&config, &path);

    // Then: nothing is written
    assert!(result.is_err());
    assert!(!path.exists());
}
