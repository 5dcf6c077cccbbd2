use async_trait::async_trait;
use dotrelay_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Looks up the addresses this host is seen from on the public internet.
#[async_trait]
pub trait PublicIpDiscovery: Send + Sync {
    async fn public_ipv4(&self) -> Result<Ipv4Addr, DomainError>;

    async fn public_ipv6(&self) -> Result<Ipv6Addr, DomainError>;
}
