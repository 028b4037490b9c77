use crate::config::{
    BusConfig, BusType, DEFAULT_SYSTEM_BUS_ADDRESS, SESSION_BUS_ADDRESS_ENV,
    SYSTEM_BUS_ADDRESS_ENV, session_bus_address, system_bus_address,
};
use crate::error::config::ConfigError;
use crate::sasl::MechanismKind;

use std::fs;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

fn set_env(key: &str, value: &str) {
    // SAFETY: every test touching the environment is #[serial].
    unsafe { std::env::set_var(key, value) };
}

fn remove_env(key: &str) {
    // SAFETY: every test touching the environment is #[serial].
    unsafe { std::env::remove_var(key) };
}

#[test]
fn given_missing_file_when_loaded_then_defaults_returned() {
    // GIVEN: An empty config directory
    let dir = TempDir::new().unwrap();

    // WHEN
    let config = BusConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(config, BusConfig::default());
    assert_eq!(config.handshake.timeout_ms, 5_000);
    assert!(config.handshake.negotiate_unix_fd);
}

/// **VALUE**: Saved settings survive a reload.
///
/// **BUG THIS CATCHES**: A field missing `Serialize`/`Deserialize`, or a
/// temp file that is never renamed into place.
#[test]
fn given_saved_config_when_loaded_then_round_trips() {
    // GIVEN: A non-default config saved to disk
    let dir = TempDir::new().unwrap();
    let mut config = BusConfig::default();
    config.handshake.timeout_ms = 250;
    config.handshake.mechanisms = vec![MechanismKind::Anonymous];
    config.bus.session_address = Some("unix:path=/tmp/bus".to_string());
    config.save(dir.path()).unwrap();

    // WHEN
    let loaded = BusConfig::load(dir.path()).unwrap();

    // THEN: Same values, and no temp file left behind
    assert_eq!(loaded, config);
    assert!(!dir.path().join("bus-client.json.tmp").exists());
}

#[test]
fn given_partial_json_when_loaded_then_missing_fields_default() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bus-client.json"),
        r#"{ "handshake": { "timeout_ms": 1000 } }"#,
    )
    .unwrap();

    let config = BusConfig::load(dir.path()).unwrap();

    assert_eq!(config.version, 1);
    assert_eq!(config.handshake.timeout_ms, 1000);
    assert_eq!(config.handshake.mechanisms.len(), 3);
}

#[test]
fn given_corrupt_json_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bus-client.json"), "{ not json").unwrap();

    let result = BusConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn given_invalid_values_when_validated_then_rejected() {
    let mut zero_timeout = BusConfig::default();
    zero_timeout.handshake.timeout_ms = 0;

    let mut huge_timeout = BusConfig::default();
    huge_timeout.handshake.timeout_ms = 300_001;

    let mut no_mechanisms = BusConfig::default();
    no_mechanisms.handshake.mechanisms.clear();

    let mut duplicate = BusConfig::default();
    duplicate.handshake.mechanisms = vec![MechanismKind::External, MechanismKind::External];

    let mut blank_address = BusConfig::default();
    blank_address.bus.system_address = Some("  ".to_string());

    let mut future_version = BusConfig::default();
    future_version.version = 2;

    for config in [
        zero_timeout,
        huge_timeout,
        no_mechanisms,
        duplicate,
        blank_address,
        future_version,
    ] {
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "Expected validation failure for {config:?}"
        );
    }
}

#[test]
fn given_invalid_config_when_saved_then_nothing_written() {
    let dir = TempDir::new().unwrap();
    let mut config = BusConfig::default();
    config.handshake.timeout_ms = 0;

    assert!(config.save(dir.path()).is_err());
    assert!(!dir.path().join("bus-client.json").exists());
}

#[test]
fn given_handshake_config_when_converted_then_options_match() {
    let mut config = BusConfig::default();
    config.handshake.timeout_ms = 1_500;
    config.handshake.negotiate_unix_fd = false;

    let options = config.handshake.to_options();

    assert_eq!(options.round_trip_timeout, Duration::from_millis(1_500));
    assert!(!options.negotiate_unix_fd);
    assert_eq!(options.mechanisms, config.handshake.mechanisms);
}

#[test]
#[serial]
fn given_configured_address_when_resolved_then_environment_is_ignored() {
    // GIVEN: Both an override and an environment value
    set_env(SESSION_BUS_ADDRESS_ENV, "unix:path=/from/env");
    let mut config = BusConfig::default();
    config.bus.session_address = Some("unix:path=/from/config".to_string());

    // WHEN
    let address = config.resolve_address(BusType::Session).unwrap();

    // THEN
    assert_eq!(address, "unix:path=/from/config");
    remove_env(SESSION_BUS_ADDRESS_ENV);
}

#[test]
#[serial]
fn given_session_env_when_resolved_then_env_address_used() {
    set_env(SESSION_BUS_ADDRESS_ENV, "unix:path=/run/user/1000/bus");

    let address = BusConfig::default()
        .resolve_address(BusType::Session)
        .unwrap();

    assert_eq!(address, "unix:path=/run/user/1000/bus");
    remove_env(SESSION_BUS_ADDRESS_ENV);
}

#[test]
#[serial]
fn given_no_session_env_when_resolved_then_address_unset() {
    remove_env(SESSION_BUS_ADDRESS_ENV);

    let result = session_bus_address();

    assert!(matches!(result, Err(ConfigError::AddressUnset { .. })));
}

/// **VALUE**: The system bus always has an address.
///
/// **WHY THIS MATTERS**: Unlike the session bus, the system bus lives at a
/// well-known socket; an unset variable must not be an error.
#[test]
#[serial]
fn given_no_system_env_when_resolved_then_well_known_socket_used() {
    remove_env(SYSTEM_BUS_ADDRESS_ENV);
    assert_eq!(system_bus_address(), DEFAULT_SYSTEM_BUS_ADDRESS);
    assert_eq!(
        DEFAULT_SYSTEM_BUS_ADDRESS,
        "unix:path=/var/run/dbus/system_bus_socket"
    );

    set_env(SYSTEM_BUS_ADDRESS_ENV, "unix:path=/custom");
    assert_eq!(system_bus_address(), "unix:path=/custom");
    remove_env(SYSTEM_BUS_ADDRESS_ENV);
}
