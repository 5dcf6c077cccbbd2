use serde::{Deserialize, Serialize};

use super::dns::DnsConfig;
use super::ecs::EcsConfig;
use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::server::ServerConfig;

const LOCAL_CONFIG_FILE: &str = "dotrelay.toml";
const SYSTEM_CONFIG_FILE: &str = "/etc/dotrelay/config.toml";

/// Main configuration structure for dotrelay
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cache and upstream resolver configuration
    #[serde(default)]
    pub dns: DnsConfig,

    /// EDNS Client-Subnet policy; absent disables ECS
    #[serde(default)]
    pub ecs: Option<EcsConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. dotrelay.toml in current directory
    /// 3. /etc/dotrelay/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if let Some(found) = Self::get_config_path() {
            Self::from_file(&found)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("DNS port cannot be 0".to_string()));
        }

        self.server.socket_addr()?;

        if self.server.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "server.channel_capacity must be greater than 0".to_string(),
            ));
        }

        if self.dns.cache_refresh_minutes.checked_mul(60).is_none() {
            return Err(ConfigError::Validation(format!(
                "dns.cache_refresh_minutes is too large: {}",
                self.dns.cache_refresh_minutes
            )));
        }

        if self.dns.query_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "dns.query_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.dns.resolvers.is_empty() {
            return Err(ConfigError::Validation(
                "No upstream resolvers configured".to_string(),
            ));
        }

        for (index, group) in self.dns.resolvers.iter().enumerate() {
            if group.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Resolver group {} has no endpoints",
                    index
                )));
            }
        }

        self.dns.resolver_groups()?;

        if let Some(ecs) = &self.ecs {
            ecs.validate()?;
        }

        Ok(())
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        if std::path::Path::new(LOCAL_CONFIG_FILE).exists() {
            Some(LOCAL_CONFIG_FILE.to_string())
        } else if std::path::Path::new(SYSTEM_CONFIG_FILE).exists() {
            Some(SYSTEM_CONFIG_FILE.to_string())
        } else {
            None
        }
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
}
