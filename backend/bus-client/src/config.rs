use crate::error::config::ConfigError;
use crate::sasl::{HandshakeOptions, MechanismKind, default_mechanisms};

use common::ErrorLocation;

use std::collections::HashSet;
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use const_format::concatcp;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "bus-client.json";
const CONFIG_VERSION: u32 = 1;
const MAX_TIMEOUT_MS: u64 = 300_000;

pub const SESSION_BUS_ADDRESS_ENV: &str = "DBUS_SESSION_BUS_ADDRESS";
pub const SYSTEM_BUS_ADDRESS_ENV: &str = "DBUS_SYSTEM_BUS_ADDRESS";
pub const SYSTEM_BUS_SOCKET: &str = "/var/run/dbus/system_bus_socket";
pub const DEFAULT_SYSTEM_BUS_ADDRESS: &str = concatcp!("unix:path=", SYSTEM_BUS_SOCKET);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    Session,
    System,
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_negotiate_unix_fd")]
    pub negotiate_unix_fd: bool,
    #[serde(default = "default_mechanisms")]
    pub mechanisms: Vec<MechanismKind>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            negotiate_unix_fd: default_negotiate_unix_fd(),
            mechanisms: default_mechanisms(),
        }
    }
}

impl HandshakeConfig {
    pub fn to_options(&self) -> HandshakeOptions {
        HandshakeOptions {
            mechanisms: self.mechanisms.clone(),
            negotiate_unix_fd: self.negotiate_unix_fd,
            round_trip_timeout: Duration::from_millis(self.timeout_ms),
            keyring_dir: None,
        }
    }
}

/// Explicit bus addresses. When unset, the environment decides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BusSection {
    pub session_address: Option<String>,
    pub system_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub handshake: HandshakeConfig,

    #[serde(default)]
    pub bus: BusSection,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            handshake: HandshakeConfig::default(),
            bus: BusSection::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_negotiate_unix_fd() -> bool {
    true
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BusConfig {
    /// Load config from {config_dir}/bus-client.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(BusConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: BusConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/bus-client.json using atomic write.
    ///
    /// Uses temp file + rename for atomicity (no corruption on crash).
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.handshake.timeout_ms == 0 || self.handshake.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid handshake timeout: {}ms (must be 1-{MAX_TIMEOUT_MS})",
                    self.handshake.timeout_ms
                ),
            });
        }

        if self.handshake.mechanisms.is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "At least one SASL mechanism is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self
            .handshake
            .mechanisms
            .iter()
            .find(|mechanism| !seen.insert(**mechanism))
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Mechanism {} listed twice", duplicate.name()),
            });
        }

        for address in [&self.bus.session_address, &self.bus.system_address]
            .into_iter()
            .flatten()
        {
            if address.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: "Bus address cannot be empty string".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Address for `bus_type`: the configured override, else the environment.
    pub fn resolve_address(&self, bus_type: BusType) -> Result<String, ConfigError> {
        let configured = match bus_type {
            BusType::Session => self.bus.session_address.clone(),
            BusType::System => self.bus.system_address.clone(),
        };

        if let Some(address) = configured {
            debug!("Using configured {bus_type:?} bus address");
            return Ok(address);
        }

        match bus_type {
            BusType::Session => session_bus_address(),
            BusType::System => Ok(system_bus_address()),
        }
    }
}

/// Session bus address from `DBUS_SESSION_BUS_ADDRESS` (a `.env` file counts).
pub fn session_bus_address() -> Result<String, ConfigError> {
    dotenvy::var(SESSION_BUS_ADDRESS_ENV)
        .ok()
        .filter(|address| !address.is_empty())
        .ok_or_else(|| ConfigError::AddressUnset {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("{SESSION_BUS_ADDRESS_ENV} is not set"),
        })
}

/// System bus address from `DBUS_SYSTEM_BUS_ADDRESS`, else the well-known socket.
pub fn system_bus_address() -> String {
    dotenvy::var(SYSTEM_BUS_ADDRESS_ENV)
        .ok()
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_BUS_ADDRESS.to_string())
}
