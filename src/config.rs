//! Server configuration: accessory identity, setup code, and the C10
//! server-loop tunables (§4.7, §6 — password source, setup ID).

use crate::protocol::pairing::SetupCode;

/// Category codes for the `ci` mDNS TXT record (delegated collaborator,
/// §6). Only the ones this crate's test fixtures use are enumerated;
/// callers may pass any raw `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AccessoryCategory {
    Other = 1,
    Bridge = 2,
    Lightbulb = 5,
    Switch = 8,
    Sensor = 10,
    Thermostat = 9,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("setup code: {0}")]
    SetupCode(#[from] crate::protocol::pairing::SetupCodeError),

    #[error("setup id must be 4 base-36 uppercase characters, got {0:?}")]
    InvalidSetupId(String),
}

/// Validated, immutable server configuration, built via
/// [`ServerConfigBuilder`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub model: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub category: u16,
    pub port: u16,
    pub max_clients: usize,
    pub setup_code: SetupCode,
    pub setup_id: Option<String>,
}

impl ServerConfig {
    #[must_use]
    pub fn builder(name: impl Into<String>, setup_code: &str) -> ServerConfigBuilder {
        ServerConfigBuilder::new(name, setup_code)
    }
}

/// Builder for [`ServerConfig`]; `build()` validates the setup code and
/// setup id (§6 — invalid format refuses to start).
pub struct ServerConfigBuilder {
    name: String,
    model: String,
    manufacturer: String,
    serial_number: String,
    firmware_revision: String,
    category: u16,
    port: u16,
    max_clients: usize,
    setup_code: String,
    setup_id: Option<String>,
}

/// Default TCP port HAP accessories listen on (§4.7).
pub const DEFAULT_PORT: u16 = 5556;
/// Default maximum concurrent clients (§4.7).
pub const DEFAULT_MAX_CLIENTS: usize = 8;

impl ServerConfigBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, setup_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: "Generic".to_string(),
            manufacturer: "Unknown".to_string(),
            serial_number: "000000000001".to_string(),
            firmware_revision: "1.0".to_string(),
            category: AccessoryCategory::Other as u16,
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            setup_code: setup_code.into(),
            setup_id: None,
        }
    }

    /// Build from a setup-code callback instead of a fixed string (§6
    /// "Password source" — e.g. a source that prints a freshly-generated
    /// code to a display at first boot). The callback runs once, here,
    /// rather than being stored for later re-invocation.
    #[must_use]
    pub fn generated(name: impl Into<String>, generate: impl FnOnce() -> String) -> Self {
        Self::new(name, generate())
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    #[must_use]
    pub fn serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = serial_number.into();
        self
    }

    #[must_use]
    pub fn firmware_revision(mut self, firmware_revision: impl Into<String>) -> Self {
        self.firmware_revision = firmware_revision.into();
        self
    }

    #[must_use]
    pub fn category(mut self, category: AccessoryCategory) -> Self {
        self.category = category as u16;
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    #[must_use]
    pub fn setup_id(mut self, setup_id: impl Into<String>) -> Self {
        self.setup_id = Some(setup_id.into());
        self
    }

    /// # Errors
    /// Returns [`ConfigError`] if the setup code isn't `DDD-DD-DDD` or the
    /// setup id isn't 4 base-36 uppercase characters.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let setup_code = SetupCode::parse(&self.setup_code)?;

        if let Some(id) = &self.setup_id {
            let valid = id.len() == 4 && id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if !valid {
                return Err(ConfigError::InvalidSetupId(id.clone()));
            }
        }

        Ok(ServerConfig {
            name: self.name,
            model: self.model,
            manufacturer: self.manufacturer,
            serial_number: self.serial_number,
            firmware_revision: self.firmware_revision,
            category: self.category,
            port: self.port,
            max_clients: self.max_clients,
            setup_code,
            setup_id: self.setup_id,
        })
    }
}
