//! Agent configuration file.
//!
//! The file holds `property=value` lines:
//!
//! ```text
//! bview_client_ip=10.0.0.5
//! bview_client_port=9070
//! bview_local_port=8080
//! ```
//!
//! All three properties are required. Blank lines and `#`/`;` comments are
//! skipped; sections are not allowed. A file that cannot be read or parsed is ignored as a whole and
//! the defaults are used.

use std::net::Ipv4Addr;
use std::path::Path;

use ini::Ini;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/broadview_config.cfg";

const CLIENT_IP: &str = "bview_client_ip";
const CLIENT_PORT: &str = "bview_client_port";
const LOCAL_PORT: &str = "bview_local_port";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ini::ParseError),
    #[error("unknown property {0}")]
    UnknownProperty(String),
    #[error("invalid value for {property}: {value}")]
    InvalidValue { property: &'static str, value: String },
    #[error("missing property {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Collector receiving asynchronous reports.
    pub client_ip: Ipv4Addr,
    pub client_port: u16,
    /// Port the REST API listens on.
    pub local_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            client_ip: Ipv4Addr::LOCALHOST,
            client_port: 9070,
            local_port: 8080,
        }
    }
}

impl AgentConfig {
    /// Parse a sectionless `property=value` file.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        let mut client_ip = None;
        let mut client_port = None;
        let mut local_port = None;

        for (property, value) in ini.general_section().iter() {
            match property {
                CLIENT_IP => client_ip = Some(parse_value(CLIENT_IP, value)?),
                CLIENT_PORT => client_port = Some(parse_value(CLIENT_PORT, value)?),
                LOCAL_PORT => local_port = Some(parse_value(LOCAL_PORT, value)?),
                other => return Err(ConfigError::UnknownProperty(other.to_string())),
            }
        }
        if let Some(section) = ini.sections().flatten().next() {
            return Err(ConfigError::UnknownProperty(format!("[{section}]")));
        }

        Ok(Self {
            client_ip: client_ip.ok_or(ConfigError::Missing(CLIENT_IP))?,
            client_port: client_port.ok_or(ConfigError::Missing(CLIENT_PORT))?,
            local_port: local_port.ok_or(ConfigError::Missing(LOCAL_PORT))?,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Read `path`, falling back to the defaults on any error.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => {
                tracing::info!(
                    client = %format!("{}:{}", config.client_ip, config.client_port),
                    local_port = config.local_port,
                    "loaded agent configuration"
                );
                config
            }
            Err(e) => {
                let config = Self::default();
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "agent configuration unusable, using defaults {}:{} <-> local:{}",
                    config.client_ip,
                    config.client_port,
                    config.local_port
                );
                config
            }
        }
    }

    /// URL asynchronous reports are posted to.
    pub fn collector_url(&self) -> String {
        format!("http://{}:{}/", self.client_ip, self.client_port)
    }
}

fn parse_value<T: std::str::FromStr>(
    property: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        property,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_properties() {
        let config = AgentConfig::parse(
            "bview_client_ip = 10.1.2.3\nbview_client_port=9100\n\n# rest\nbview_local_port=8090\n",
        )
        .unwrap();
        assert_eq!(config.client_ip, Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(config.client_port, 9100);
        assert_eq!(config.local_port, 8090);
        assert_eq!(config.collector_url(), "http://10.1.2.3:9100/");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            AgentConfig::parse("bview_client_ip=300.1.1.1\nbview_client_port=1\nbview_local_port=2"),
            Err(ConfigError::InvalidValue { property: CLIENT_IP, .. })
        ));
        assert!(matches!(
            AgentConfig::parse("bview_client_ip=1.1.1.1\nbview_colour=blue"),
            Err(ConfigError::UnknownProperty(_))
        ));
        assert!(matches!(
            AgentConfig::parse("bview_client_ip=1.1.1.1\nbview_client_port=1"),
            Err(ConfigError::Missing(LOCAL_PORT))
        ));
        assert!(AgentConfig::parse("bview_client_ip").is_err());
        assert!(matches!(
            AgentConfig::parse("[agent]\nbview_client_ip=1.1.1.1"),
            Err(ConfigError::UnknownProperty(_))
        ));
        assert!(matches!(
            AgentConfig::parse("bview_client_ip=1.1.1.1\nbview_client_port=70000\nbview_local_port=2"),
            Err(ConfigError::InvalidValue { property: CLIENT_PORT, .. })
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AgentConfig::load(Path::new("/nonexistent/broadview_config.cfg"));
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.collector_url(), "http://127.0.0.1:9070/");
    }
}
