use async_trait::async_trait;
use dotrelay_domain::ResolverEndpoint;
use std::fmt;
use std::time::Duration;

/// Where a probe gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    Dial,
    Handshake,
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStage::Dial => f.write_str("dial"),
            ProbeStage::Handshake => f.write_str("handshake"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub stage: ProbeStage,
    pub reason: String,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}

/// Result of connecting to an endpoint and completing a TLS handshake.
///
/// `elapsed` runs from the first dial attempt to success, or to the failing
/// stage when `result` is an error.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub endpoint: ResolverEndpoint,
    pub elapsed: Duration,
    pub result: Result<(), ProbeFailure>,
}

impl ProbeOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn probe(&self, endpoint: &ResolverEndpoint) -> ProbeOutcome;
}
