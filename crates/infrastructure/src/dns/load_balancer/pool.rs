use crate::dns::forwarding::ResponseParser;
use crate::dns::subnet::SubnetPolicy;
use dotrelay_application::ports::{ReachabilityProbe, UpstreamExchange};
use dotrelay_application::Exchange;
use dotrelay_domain::{DomainError, ResolverEndpoint};
use hickory_proto::op::Message;
use rustc_hash::FxHashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::fastest::FastestAnswer;
use super::scatter::scatter_gather;

/// The upstream resolvers chosen at startup. Membership never changes.
pub struct ResolverPool {
    members: Vec<Arc<dyn UpstreamExchange>>,
    subnet: Arc<SubnetPolicy>,
    fastest: FastestAnswer,
}

impl ResolverPool {
    pub fn new(
        members: Vec<Arc<dyn UpstreamExchange>>,
        subnet: Arc<SubnetPolicy>,
        reachability: Arc<dyn ReachabilityProbe>,
    ) -> Result<Self, DomainError> {
        if members.is_empty() {
            return Err(DomainError::NoHealthyResolvers);
        }

        for (index, member) in members.iter().enumerate() {
            info!(index, server = %member.endpoint(), "Upstream resolver");
        }
        if let Some(v4) = subnet.v4() {
            info!(network = %v4.network(), prefix = v4.source_prefix(), "Upstream IPv4 subnet");
        }
        if let Some(v6) = subnet.v6() {
            info!(network = %v6.network(), prefix = v6.source_prefix(), "Upstream IPv6 subnet");
        }

        Ok(Self {
            members,
            subnet,
            fastest: FastestAnswer::new(reachability),
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &ResolverEndpoint> {
        self.members.iter().map(|m| m.endpoint())
    }

    /// Sends the request to every member and reduces their answers to one.
    ///
    /// Returns `None`, with a warning, when the exchange is not a single
    /// unanswered question. Otherwise the returned exchange carries a
    /// response: the first non-NOERROR answer or, for types other than
    /// A/AAAA, the first NOERROR answer; for A/AAAA without such a decision
    /// the fastest reachable candidate address.
    pub async fn resolve(&self, mut exchange: Exchange) -> Option<Exchange> {
        let sn = exchange.correlation;
        let id = exchange.request.metadata.id;

        if exchange.request.queries.len() != 1 {
            warn!(sn = %sn, id, questions = exchange.request.queries.len(), "Rejected query");
            return None;
        }
        if !exchange.request.answers.is_empty() {
            warn!(sn = %sn, id, answers = exchange.request.answers.len(), "Rejected query");
            return None;
        }
        if exchange.response.is_some() {
            warn!(sn = %sn, id, "Rejected query: response already present");
            return None;
        }

        let mut request = exchange.request.clone();
        let client_ip: Option<IpAddr> = exchange.client.map(|addr| addr.ip());
        self.subnet.attach(&mut request, client_ip);
        let request = Arc::new(request);

        let start = Instant::now();
        let dispatches = self.members.iter().map(|member| {
            let member = Arc::clone(member);
            let request = Arc::clone(&request);
            async move {
                match member.exchange(&request).await {
                    Ok(response) => Some(response),
                    Err(e) => {
                        debug!(server = %member.endpoint(), error = %e, "Upstream exchange failed");
                        None
                    }
                }
            }
        });
        let results = scatter_gather(dispatches).await;

        debug!(
            sn = %sn,
            id,
            members = self.members.len(),
            answered = results.iter().filter(|(_, r)| r.is_some()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fan-out drained"
        );

        let address_query = ResponseParser::question_type(&request)
            .map(ResponseParser::is_address_type)
            .unwrap_or(false);
        let mut decided: Option<Message> = None;
        let mut seen: FxHashSet<String> = FxHashSet::default();

        for (_, response) in results {
            let Some(response) = response else {
                continue;
            };
            if decided.is_some() {
                continue;
            }

            if !ResponseParser::is_success(&response) {
                warn!(
                    sn = %sn,
                    id,
                    rcode = ResponseParser::rcode_to_status(response.metadata.response_code),
                    "Upstream returned failure code"
                );
                decided = Some(response);
                continue;
            }

            if address_query {
                for record in &response.answers {
                    let Some(ip) = ResponseParser::address_of(record) else {
                        continue;
                    };
                    if seen.insert(ip.to_string()) {
                        exchange.candidates.push(record.clone());
                    }
                }
            } else {
                decided = Some(response);
            }
        }

        let response = match decided {
            Some(response) => response,
            None => self.fastest.select(&exchange).await,
        };
        exchange.response = Some(response);
        Some(exchange)
    }
}
