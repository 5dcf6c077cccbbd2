use async_trait::async_trait;
use dotrelay_application::ports::PublicIpDiscovery;
use dotrelay_domain::DomainError;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::info;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct IpReply {
    ip: String,
}

/// Asks an HTTP "what is my IP" service that answers `{"ip": "..."}`.
pub struct HttpPublicIp {
    client: reqwest::Client,
    v4_url: String,
    v6_url: String,
}

impl HttpPublicIp {
    pub fn new(v4_url: impl Into<String>, v6_url: impl Into<String>) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dotrelay/", env!("CARGO_PKG_VERSION")))
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .map_err(|e| DomainError::PublicIpDiscovery(e.to_string()))?;

        Ok(Self {
            client,
            v4_url: v4_url.into(),
            v6_url: v6_url.into(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<IpAddr, DomainError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                DomainError::PublicIpDiscovery(format!("fetch error for {}: {}", url, e))
            })?;

        if !response.status().is_success() {
            return Err(DomainError::PublicIpDiscovery(format!(
                "HTTP {} for {}",
                response.status().as_u16(),
                url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DomainError::PublicIpDiscovery(format!("read error for {}: {}", url, e)))?;

        let ip = parse_reply(&body)?;
        info!(url = %url, ip = %ip, "Public address discovered");
        Ok(ip)
    }
}

fn parse_reply(body: &str) -> Result<IpAddr, DomainError> {
    let reply: IpReply = serde_json::from_str(body)
        .map_err(|e| DomainError::PublicIpDiscovery(format!("bad reply: {}", e)))?;
    reply
        .ip
        .trim()
        .parse()
        .map_err(|_| DomainError::InvalidIpAddress(reply.ip.clone()))
}

#[async_trait]
impl PublicIpDiscovery for HttpPublicIp {
    async fn public_ipv4(&self) -> Result<Ipv4Addr, DomainError> {
        match self.fetch(&self.v4_url).await? {
            IpAddr::V4(ip) => Ok(ip),
            IpAddr::V6(ip) => ip.to_ipv4_mapped().ok_or_else(|| {
                DomainError::PublicIpDiscovery(format!("expected IPv4, got {}", ip))
            }),
        }
    }

    async fn public_ipv6(&self) -> Result<Ipv6Addr, DomainError> {
        match self.fetch(&self.v6_url).await? {
            IpAddr::V6(ip) => Ok(ip),
            IpAddr::V4(ip) => Err(DomainError::PublicIpDiscovery(format!(
                "expected IPv6, got {}",
                ip
            ))),
        }
    }
}
