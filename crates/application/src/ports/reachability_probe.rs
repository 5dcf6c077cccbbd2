use async_trait::async_trait;
use std::net::IpAddr;

/// Latency reported for an address none of whose probed ports answered.
pub const UNREACHABLE_MS: u32 = u32::MAX;

/// Measures how quickly a candidate answer address accepts connections.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Best connect latency in whole milliseconds, or [`UNREACHABLE_MS`].
    async fn latency_ms(&self, ip: IpAddr) -> u32;
}
