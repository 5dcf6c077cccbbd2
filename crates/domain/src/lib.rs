//! dotrelay domain layer
pub mod config;
pub mod correlation;
pub mod errors;
pub mod resolver_endpoint;

pub use config::{CliOverrides, Config, ConfigError, DnsConfig, EcsConfig, LoggingConfig};
pub use correlation::{CorrelationId, CorrelationSequence};
pub use errors::DomainError;
pub use resolver_endpoint::{ResolverEndpoint, DEFAULT_DOT_PORT};
