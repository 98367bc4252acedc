//! Harness configuration (`serverDetails.ini`).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

pub const DEFAULT_SECTION: &str = "server_details";

pub const DEFAULT_AGENT_IP: &str = "127.0.0.1";
pub const DEFAULT_AGENT_PORT: u16 = 8080;
pub const DEFAULT_AGENT_BINARY: &str = "/usr/bin/ops-broadview";
pub const DEFAULT_READY_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_SWITCH_INTERFACE: &str = "eth0";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: ini::Error,
    },
    #[error("invalid INI: {0}")]
    Parse(#[from] ini::ParseError),
    #[error("section [{0}] not found")]
    MissingSection(String),
    #[error("Unknown platform is provided in the serverDetails.ini file... ({0:?})")]
    UnknownPlatform(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Switch the agent runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Agent started by the harness inside a simulated switch.
    Virtual,
    /// Agent already running on a physical switch.
    Physical,
}

impl Platform {
    pub fn from_switch_type(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim() {
            "" | "genericx86-64" => Ok(Platform::Virtual),
            "as5712" => Ok(Platform::Physical),
            other => Err(ConfigError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Flat key/value view of one INI section.
#[derive(Debug, Clone, Default)]
pub struct ServerDetails {
    values: BTreeMap<String, String>,
}

impl ServerDetails {
    pub fn load(path: &Path, section: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ini(&ini, section)
    }

    pub fn parse(text: &str, section: &str) -> Result<Self, ConfigError> {
        Self::from_ini(&Ini::load_from_str(text)?, section)
    }

    fn from_ini(ini: &Ini, section: &str) -> Result<Self, ConfigError> {
        let props = ini
            .section(Some(section))
            .ok_or_else(|| ConfigError::MissingSection(section.to_string()))?;
        let values = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.trim().to_string()))
            .collect();
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).filter(|v| !v.is_empty()).unwrap_or(default)
    }

    pub fn platform(&self) -> Result<Platform, ConfigError> {
        Platform::from_switch_type(self.get_or("switch_type", ""))
    }

    pub fn agent_server_ip(&self) -> &str {
        self.get_or("agent_server_ip", DEFAULT_AGENT_IP)
    }

    pub fn agent_server_port(&self) -> Result<u16, ConfigError> {
        self.number("agent_server_port", DEFAULT_AGENT_PORT)
    }

    pub fn agent_binary(&self) -> &str {
        self.get_or("agent_binary", DEFAULT_AGENT_BINARY)
    }

    pub fn switch_interface(&self) -> &str {
        self.get_or("switch_interface", DEFAULT_SWITCH_INTERFACE)
    }

    pub fn agent_ready_wait(&self) -> Result<Duration, ConfigError> {
        self.number("agent_ready_wait_secs", DEFAULT_READY_WAIT.as_secs())
            .map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        self.number("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT.as_secs())
            .map(Duration::from_secs)
    }

    fn number<T: std::str::FromStr>(
        &self,
        key: &'static str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get(key).filter(|v| !v.is_empty()) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw.to_string(),
            }),
        }
    }
}
