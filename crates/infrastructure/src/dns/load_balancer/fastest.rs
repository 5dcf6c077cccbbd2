use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use dotrelay_application::ports::{ReachabilityProbe, UNREACHABLE_MS};
use dotrelay_application::Exchange;
use hickory_proto::op::Message;
use std::sync::Arc;
use tracing::{debug, info};

use super::scatter::scatter_gather;

/// TTL written on the record chosen by latency.
pub const SELECTED_ANSWER_TTL: u32 = 3600;

/// Picks the address candidate that accepts connections fastest.
pub struct FastestAnswer {
    reachability: Arc<dyn ReachabilityProbe>,
}

impl FastestAnswer {
    pub fn new(reachability: Arc<dyn ReachabilityProbe>) -> Self {
        Self { reachability }
    }

    /// Probes every candidate concurrently and answers with the quickest one.
    ///
    /// Equal latencies keep the earlier candidate. No candidates, or none
    /// reachable, yields NXDOMAIN.
    pub async fn select(&self, exchange: &Exchange) -> Message {
        let request = &exchange.request;
        if exchange.candidates.is_empty() {
            info!(sn = %exchange.correlation, id = request.metadata.id, "No address candidates");
            return MessageBuilder::nxdomain(request);
        }

        let probes = exchange.candidates.iter().map(|record| {
            let reachability = Arc::clone(&self.reachability);
            let ip = ResponseParser::address_of(record);
            async move {
                match ip {
                    Some(ip) => reachability.latency_ms(ip).await,
                    None => UNREACHABLE_MS,
                }
            }
        });

        let mut latencies = vec![UNREACHABLE_MS; exchange.candidates.len()];
        for (index, latency) in scatter_gather(probes).await {
            latencies[index] = latency;
        }

        let mut fastest = 0;
        for (index, &latency) in latencies.iter().enumerate() {
            if latency < latencies[fastest] {
                fastest = index;
            }
        }

        debug!(
            sn = %exchange.correlation,
            candidates = latencies.len(),
            fastest,
            latency_ms = latencies[fastest],
            "Candidate latencies measured"
        );

        if latencies[fastest] == UNREACHABLE_MS {
            info!(
                sn = %exchange.correlation,
                id = request.metadata.id,
                "All candidates unreachable"
            );
            return MessageBuilder::nxdomain(request);
        }

        let mut record = exchange.candidates[fastest].clone();
        record.ttl = SELECTED_ANSWER_TTL;
        MessageBuilder::reply(request, vec![record])
    }
}
