use anyhow::Context;
use dotrelay_application::ports::PublicIpDiscovery;
use dotrelay_domain::Config;
use dotrelay_infrastructure::dns::{SubnetDescriptor, SubnetPolicy};
use dotrelay_infrastructure::system::HttpPublicIp;
use std::net::IpAddr;
use tracing::info;

/// Computes the ECS descriptors once. Addresses left empty in the config
/// are discovered over HTTP; a failed discovery aborts startup.
pub async fn build_subnet_policy(config: &Config) -> anyhow::Result<SubnetPolicy> {
    let Some(ecs) = &config.ecs else {
        info!("ECS disabled");
        return Ok(SubnetPolicy::disabled());
    };

    let discovery = HttpPublicIp::new(&ecs.discovery_v4_url, &ecs.discovery_v6_url)?;

    let v4 = match ecs.ipv4_addr()? {
        Some(ip) => ip,
        None => discovery
            .public_ipv4()
            .await
            .context("Failed to discover public IPv4 address")?,
    };
    let v6 = match ecs.ipv6_addr()? {
        Some(ip) => ip,
        None => discovery
            .public_ipv6()
            .await
            .context("Failed to discover public IPv6 address")?,
    };

    let policy = SubnetPolicy::new(
        Some(SubnetDescriptor::from_ip(IpAddr::V4(v4), ecs.mask_bits_v4)),
        Some(SubnetDescriptor::from_ip(IpAddr::V6(v6), ecs.mask_bits_v6)),
    );
    info!(ipv4 = %v4, ipv6 = %v6, "ECS enabled");
    Ok(policy)
}
