use super::builders::{address_record, txt_record};
use async_trait::async_trait;
use dotrelay_application::ports::{
    EndpointProber, ProbeFailure, ProbeOutcome, ProbeStage, ReachabilityProbe, UpstreamExchange,
    UNREACHABLE_MS,
};
use dotrelay_domain::{DomainError, ResolverEndpoint};
use dotrelay_infrastructure::dns::MessageBuilder;
use hickory_proto::op::{Message, ResponseCode};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub enum Behavior {
    /// NOERROR with one A/AAAA record per address.
    Addresses(Vec<IpAddr>),
    /// NOERROR with one TXT record.
    Text(String),
    /// Empty answer with this code.
    Code(ResponseCode),
    /// Transport failure.
    Fail,
}

/// Scripted pool member. Echoes the request's OPT record so ECS handling
/// can be observed on the way back.
pub struct StubUpstream {
    endpoint: ResolverEndpoint,
    behavior: Behavior,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
    pub completed: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<Message>>>,
}

impl StubUpstream {
    pub fn new(host: &str, behavior: Behavior) -> Self {
        Self {
            endpoint: ResolverEndpoint::new(host, 853),
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn last_request(&self) -> Option<Message> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl UpstreamExchange for StubUpstream {
    async fn exchange(&self, request: &Message) -> Result<Message, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let name = request.queries[0].name().to_ascii();
        let result = match &self.behavior {
            Behavior::Addresses(ips) => {
                let records = ips.iter().map(|ip| address_record(&name, *ip, 300)).collect();
                let mut reply = MessageBuilder::reply(request, records);
                reply.edns = request.edns.clone();
                Ok(reply)
            }
            Behavior::Text(text) => {
                let mut reply = MessageBuilder::reply(request, vec![txt_record(&name, text)]);
                reply.edns = request.edns.clone();
                Ok(reply)
            }
            Behavior::Code(code) => {
                let mut reply = MessageBuilder::reply(request, Vec::new());
                reply.metadata.response_code = *code;
                Ok(reply)
            }
            Behavior::Fail => Err(DomainError::TransportTimeout {
                server: self.endpoint.to_string(),
            }),
        };

        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn endpoint(&self) -> &ResolverEndpoint {
        &self.endpoint
    }
}

/// Reports scripted probe results keyed by host; unknown hosts fail at dial.
pub struct StubProber {
    results: HashMap<String, Option<Duration>>,
    pub probed: Arc<Mutex<Vec<String>>>,
}

impl StubProber {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            probed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn healthy(mut self, host: &str, elapsed_ms: u64) -> Self {
        self.results
            .insert(host.to_string(), Some(Duration::from_millis(elapsed_ms)));
        self
    }

    pub fn broken(mut self, host: &str) -> Self {
        self.results.insert(host.to_string(), None);
        self
    }
}

#[async_trait]
impl EndpointProber for StubProber {
    async fn probe(&self, endpoint: &ResolverEndpoint) -> ProbeOutcome {
        self.probed.lock().unwrap().push(endpoint.host().to_string());

        match self.results.get(endpoint.host()).copied().flatten() {
            Some(elapsed) => ProbeOutcome {
                endpoint: endpoint.clone(),
                elapsed,
                result: Ok(()),
            },
            None => ProbeOutcome {
                endpoint: endpoint.clone(),
                elapsed: Duration::from_millis(1000),
                result: Err(ProbeFailure {
                    stage: ProbeStage::Dial,
                    reason: "connection refused".to_string(),
                }),
            },
        }
    }
}

/// Scripted latency per address; anything unlisted is unreachable.
pub struct FixedLatency {
    latencies: HashMap<IpAddr, u32>,
    pub probes: Arc<AtomicUsize>,
}

impl FixedLatency {
    pub fn new(latencies: &[(&str, u32)]) -> Self {
        Self {
            latencies: latencies
                .iter()
                .map(|(ip, ms)| (ip.parse().unwrap(), *ms))
                .collect(),
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for FixedLatency {
    async fn latency_ms(&self, ip: IpAddr) -> u32 {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.latencies.get(&ip).copied().unwrap_or(UNREACHABLE_MS)
    }
}
