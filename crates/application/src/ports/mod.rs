mod endpoint_prober;
mod public_ip;
mod reachability_probe;
mod upstream_exchange;

pub use endpoint_prober::{EndpointProber, ProbeFailure, ProbeOutcome, ProbeStage};
pub use public_ip::PublicIpDiscovery;
pub use reachability_probe::{ReachabilityProbe, UNREACHABLE_MS};
pub use upstream_exchange::UpstreamExchange;
