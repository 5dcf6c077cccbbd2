use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid resolver endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid DNS response: {0}")]
    InvalidDnsResponse(String),

    #[error("Transaction id mismatch from {server}: sent {sent}, received {received}")]
    TransactionIdMismatch {
        server: String,
        sent: u16,
        received: u16,
    },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Transport timeout connecting to {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection refused by {server}")]
    TransportConnectionRefused { server: String },

    #[error("TLS handshake with {server} failed: {reason}")]
    TransportHandshake { server: String, reason: String },

    #[error("Illegal pipeline transition from {from} to {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No upstream resolver survived the startup health race")]
    NoHealthyResolvers,

    #[error("Public address discovery failed: {0}")]
    PublicIpDiscovery(String),
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::IoError(e.to_string())
    }
}
