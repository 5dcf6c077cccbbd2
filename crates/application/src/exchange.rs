use dotrelay_domain::CorrelationId;
use hickory_proto::op::Message;
use hickory_proto::rr::rdata::opt::EdnsCode;
use hickory_proto::rr::Record;
use std::net::SocketAddr;

/// A query travelling through the pipeline together with everything later
/// stages need to answer it. Owned by exactly one stage at a time.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub correlation: CorrelationId,
    /// `None` for internally generated queries.
    pub client: Option<SocketAddr>,
    pub request: Message,
    /// Distinct address records gathered during fan-in (A/AAAA only).
    pub candidates: Vec<Record>,
    pub response: Option<Message>,
    /// The response came from the answer cache.
    pub cached: bool,
}

impl Exchange {
    pub fn from_client(correlation: CorrelationId, client: SocketAddr, request: Message) -> Self {
        Self {
            correlation,
            client: Some(client),
            request,
            candidates: Vec::new(),
            response: None,
            cached: false,
        }
    }

    /// A query the proxy issues to itself; its answer only feeds the cache.
    pub fn internal(request: Message) -> Self {
        Self {
            correlation: CorrelationId::INTERNAL,
            client: None,
            request,
            candidates: Vec::new(),
            response: None,
            cached: false,
        }
    }

    pub fn with_cached_response(mut self, response: Message) -> Self {
        self.response = Some(response);
        self.cached = true;
        self
    }

    pub fn is_internal(&self) -> bool {
        self.correlation.is_internal()
    }

    /// The client put its own ECS option on the request.
    pub fn request_has_subnet(&self) -> bool {
        self.request
            .edns
            .as_ref()
            .and_then(|edns| edns.option(EdnsCode::Subnet))
            .is_some()
    }
}
