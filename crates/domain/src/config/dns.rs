use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::ConfigError;
use crate::ResolverEndpoint;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsConfig {
    /// Interval of the cache refresh sweep. `0` disables the cache entirely.
    #[serde(default = "default_cache_refresh_minutes")]
    pub cache_refresh_minutes: u64,

    /// Deadline for one upstream exchange (write + read) after the handshake.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Outer list: logical resolvers. Inner list: alternate URLs for the same resolver.
    #[serde(default = "default_resolvers")]
    pub resolvers: Vec<Vec<String>>,
}

impl DnsConfig {
    pub fn cache_enabled(&self) -> bool {
        self.cache_refresh_minutes > 0
    }

    /// `None` when the cache is disabled or the interval does not fit in
    /// seconds; `validate()` rejects the latter.
    pub fn cache_refresh_interval(&self) -> Option<Duration> {
        if !self.cache_enabled() {
            return None;
        }
        self.cache_refresh_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Parses every configured URL, keeping the group structure.
    pub fn resolver_groups(&self) -> Result<Vec<Vec<ResolverEndpoint>>, ConfigError> {
        self.resolvers
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|url| {
                        url.parse::<ResolverEndpoint>()
                            .map_err(|e| ConfigError::Validation(e.to_string()))
                    })
                    .collect()
            })
            .collect()
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            cache_refresh_minutes: default_cache_refresh_minutes(),
            query_timeout_ms: default_query_timeout_ms(),
            resolvers: default_resolvers(),
        }
    }
}

fn default_cache_refresh_minutes() -> u64 {
    10
}

fn default_query_timeout_ms() -> u64 {
    2000
}

fn default_resolvers() -> Vec<Vec<String>> {
    vec![
        vec![
            "tls://dns.google:853".to_string(),
            "tls://8.8.8.8:853".to_string(),
            "tls://8.8.4.4:853".to_string(),
        ],
        vec![
            "tls://one.one.one.one:853".to_string(),
            "tls://1.1.1.1:853".to_string(),
            "tls://1.0.0.1:853".to_string(),
        ],
    ]
}
