use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

use super::errors::ConfigError;

/// Maximum source prefix lengths per address family.
pub const MAX_MASK_BITS_V4: u8 = 32;
pub const MAX_MASK_BITS_V6: u8 = 128;

/// EDNS Client-Subnet settings. The section being absent disables ECS.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EcsConfig {
    /// Empty means "discover the public IPv4 address at startup".
    #[serde(default)]
    pub ipv4: String,

    /// Empty means "discover the public IPv6 address at startup".
    #[serde(default)]
    pub ipv6: String,

    /// `0` selects the RFC 7871 recommended default.
    #[serde(default)]
    pub mask_bits_v4: u8,

    #[serde(default)]
    pub mask_bits_v6: u8,

    #[serde(default = "default_discovery_v4_url")]
    pub discovery_v4_url: String,

    #[serde(default = "default_discovery_v6_url")]
    pub discovery_v6_url: String,
}

impl EcsConfig {
    pub fn ipv4_addr(&self) -> Result<Option<Ipv4Addr>, ConfigError> {
        parse_optional(&self.ipv4, "ipv4")
    }

    pub fn ipv6_addr(&self) -> Result<Option<Ipv6Addr>, ConfigError> {
        parse_optional(&self.ipv6, "ipv6")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mask_bits_v4 > MAX_MASK_BITS_V4 {
            return Err(ConfigError::Validation(format!(
                "ecs.mask_bits_v4 must be <= {}, got {}",
                MAX_MASK_BITS_V4, self.mask_bits_v4
            )));
        }
        if self.mask_bits_v6 > MAX_MASK_BITS_V6 {
            return Err(ConfigError::Validation(format!(
                "ecs.mask_bits_v6 must be <= {}, got {}",
                MAX_MASK_BITS_V6, self.mask_bits_v6
            )));
        }
        self.ipv4_addr()?;
        self.ipv6_addr()?;
        Ok(())
    }
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            ipv4: String::new(),
            ipv6: String::new(),
            mask_bits_v4: 0,
            mask_bits_v6: 0,
            discovery_v4_url: default_discovery_v4_url(),
            discovery_v6_url: default_discovery_v6_url(),
        }
    }
}

fn parse_optional<T: std::str::FromStr>(raw: &str, field: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::Validation(format!("ecs.{} '{}': {}", field, raw, e)))
}

fn default_discovery_v4_url() -> String {
    "https://api.ipify.org?format=json".to_string()
}

fn default_discovery_v6_url() -> String {
    "https://api6.ipify.org?format=json".to_string()
}
