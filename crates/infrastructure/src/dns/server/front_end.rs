use super::refresh::run_refresh;
use super::state::FrontEndState;
use crate::dns::cache::AnswerCache;
use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use crate::dns::subnet::SubnetPolicy;
use dotrelay_application::Exchange;
use dotrelay_domain::{CorrelationSequence, DomainError};
use hickory_proto::op::{Message, MessageType};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Largest datagram read from a client.
pub const MAX_UDP_PACKET: usize = 4096;

#[derive(Debug, Clone)]
pub struct FrontEndSettings {
    pub bind: SocketAddr,
    pub channel_capacity: usize,
    /// `None` disables the answer cache and the refresh sweep.
    pub refresh_interval: Option<Duration>,
}

/// The resolver side of the pipeline: where client work is sent and where
/// answers come back.
pub struct PipelineChannels {
    pub requests: mpsc::Receiver<Exchange>,
    pub responses: mpsc::Sender<Exchange>,
}

/// Plain UDP listener in front of the resolver pool.
///
/// Shutdown happens in two phases: [`stop_read`](Self::stop_read) stops
/// accepting packets and closes the request channel once every accepted
/// packet has been handed on; [`stop_write`](Self::stop_write) stops the
/// cache, drains the response channel to the clients and releases the socket.
pub struct UdpFrontEnd {
    settings: FrontEndSettings,
    cache: Arc<AnswerCache>,
    state: FrontEndState,
    sequence: Arc<CorrelationSequence>,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    socket: Option<Arc<UdpSocket>>,
    requests: Option<mpsc::Sender<Exchange>>,
    responses: Option<mpsc::Sender<Exchange>>,
    responses_rx: Option<mpsc::Receiver<Exchange>>,
    reader: Option<JoinHandle<()>>,
    refresher: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl UdpFrontEnd {
    pub fn new(settings: FrontEndSettings, cache: Arc<AnswerCache>) -> (Self, PipelineChannels) {
        let capacity = settings.channel_capacity.max(1);
        let (requests_tx, requests_rx) = mpsc::channel(capacity);
        let (responses_tx, responses_rx) = mpsc::channel(capacity);

        let front_end = Self {
            settings,
            cache,
            state: FrontEndState::Created,
            sequence: Arc::new(CorrelationSequence::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            socket: None,
            requests: Some(requests_tx),
            responses: Some(responses_tx.clone()),
            responses_rx: Some(responses_rx),
            reader: None,
            refresher: None,
            writer: None,
        };
        let channels = PipelineChannels {
            requests: requests_rx,
            responses: responses_tx,
        };
        (front_end, channels)
    }

    pub fn state(&self) -> FrontEndState {
        self.state
    }

    /// Address the socket is bound to, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Binds the socket and starts the read, write and refresh loops.
    pub async fn start(&mut self) -> Result<(), DomainError> {
        if self.state != FrontEndState::Created {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.as_str(),
                to: FrontEndState::Running.as_str(),
            });
        }

        let socket = UdpSocket::bind(self.settings.bind).await.map_err(|e| {
            DomainError::ConfigError(format!("Cannot bind UDP {}: {}", self.settings.bind, e))
        })?;
        let socket = Arc::new(socket);
        let local_addr = socket.local_addr()?;

        let (Some(requests), Some(responses), Some(responses_rx)) = (
            self.requests.clone(),
            self.responses.clone(),
            self.responses_rx.take(),
        ) else {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.as_str(),
                to: FrontEndState::Running.as_str(),
            });
        };

        self.state.transition(FrontEndState::Running)?;
        self.running.store(true, Ordering::Release);

        if let Some(every) = self.settings.refresh_interval {
            self.cache.start();
            self.refresher = Some(tokio::spawn(run_refresh(
                Arc::clone(&self.cache),
                requests.clone(),
                every,
                Arc::clone(&self.running),
                self.shutdown.clone(),
            )));
        }

        self.writer = Some(tokio::spawn(write_loop(
            Arc::clone(&socket),
            Arc::clone(&self.cache),
            responses_rx,
        )));

        let reader = Reader {
            socket: Arc::clone(&socket),
            cache: Arc::clone(&self.cache),
            requests,
            responses,
            sequence: Arc::clone(&self.sequence),
            running: Arc::clone(&self.running),
            tracker: self.tracker.clone(),
        };
        self.reader = Some(tokio::spawn(reader.run(self.shutdown.clone())));

        self.socket = Some(socket);
        info!(address = %local_addr, "UDP server running");
        Ok(())
    }

    /// Stops accepting packets, waits for every accepted packet to reach
    /// its next stage, then closes the request channel.
    pub async fn stop_read(&mut self) -> Result<(), DomainError> {
        self.state.transition(FrontEndState::ReadStopped)?;
        info!("UDP server read stopping");

        self.running.store(false, Ordering::Release);
        self.shutdown.cancel();

        for handle in [self.reader.take(), self.refresher.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = handle.await {
                error!(error = %e, "Read-side task failed");
            }
        }

        info!(in_flight = self.tracker.len(), "Waiting for accepted packets");
        self.tracker.close();
        self.tracker.wait().await;

        self.requests = None;
        info!("UDP server read stopped, request channel closed");
        Ok(())
    }

    /// Stops the cache, drains the response channel and closes the socket.
    pub async fn stop_write(&mut self) -> Result<(), DomainError> {
        self.state.transition(FrontEndState::WriteStopped)?;
        info!("UDP server write stopping");

        self.cache.stop().await;
        self.responses = None;

        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                error!(error = %e, "Writer task failed");
            }
        }

        self.socket = None;
        info!("UDP server write stopped");
        Ok(())
    }
}

struct Reader {
    socket: Arc<UdpSocket>,
    cache: Arc<AnswerCache>,
    requests: mpsc::Sender<Exchange>,
    responses: mpsc::Sender<Exchange>,
    sequence: Arc<CorrelationSequence>,
    running: Arc<AtomicBool>,
    tracker: TaskTracker,
}

impl Reader {
    async fn run(self, shutdown: CancellationToken) {
        let mut buf = vec![0u8; MAX_UDP_PACKET];

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, peer) = match received {
                Ok(received) => received,
                Err(e) if is_closed(&e) => {
                    warn!(error = %e, "UDP socket closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "UDP receive failed");
                    continue;
                }
            };

            if len == 0 {
                warn!(client = %peer, "Empty datagram");
                continue;
            }
            if !self.running.load(Ordering::Acquire) {
                info!("Packet received after read stop");
                break;
            }

            // Decoding copies everything out of `buf`, which the next
            // receive overwrites.
            self.accept(&buf[..len], peer);
        }

        debug!("UDP read loop exited");
    }

    fn accept(&self, packet: &[u8], peer: SocketAddr) {
        let sn = self.sequence.next_id();

        let request = match Message::from_vec(packet) {
            Ok(request) => request,
            Err(e) => {
                warn!(sn = %sn, client = %peer, error = %e, "Undecodable packet");
                return;
            }
        };
        let id = request.metadata.id;

        if request.metadata.message_type != MessageType::Query || !request.answers.is_empty() {
            warn!(sn = %sn, id, client = %peer, "Packet already answered");
            return;
        }
        let Some(question) = request.queries.first() else {
            warn!(sn = %sn, id, client = %peer, "Packet without question");
            return;
        };

        info!(
            sn = %sn,
            id,
            client = %peer,
            name = %question.name(),
            record_type = %question.query_type(),
            "Query received"
        );

        let exchange = Exchange::from_client(sn, peer, request);

        match self.cache.get(&exchange.request) {
            Some(cached) => {
                let responses = self.responses.clone();
                let exchange = exchange.with_cached_response(cached);
                self.tracker.spawn(async move {
                    if responses.send(exchange).await.is_err() {
                        debug!(sn = %sn, "Response channel closed");
                    }
                });
            }
            None => {
                let requests = self.requests.clone();
                self.tracker.spawn(async move {
                    if requests.send(exchange).await.is_err() {
                        debug!(sn = %sn, "Request channel closed");
                    }
                });
            }
        }
    }
}

fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionAborted
    )
}

async fn write_loop(
    socket: Arc<UdpSocket>,
    cache: Arc<AnswerCache>,
    mut responses: mpsc::Receiver<Exchange>,
) {
    while let Some(mut exchange) = responses.recv().await {
        let sn = exchange.correlation;

        let Some(mut response) = exchange.response.take() else {
            error!(sn = %sn, id = exchange.request.metadata.id, "Exchange without response");
            continue;
        };

        if !exchange.request_has_subnet() {
            SubnetPolicy::strip(&mut response);
        }
        if !exchange.cached {
            cache.update(Some(&response));
        }

        if exchange.is_internal() {
            debug!(
                name = ?exchange.request.queries.first().map(|q| q.name().to_ascii()),
                rcode = ResponseParser::rcode_to_status(response.metadata.response_code),
                "Refresh answer absorbed"
            );
            continue;
        }
        let Some(client) = exchange.client else {
            debug!(sn = %sn, "No client address");
            continue;
        };

        response.metadata.id = exchange.request.metadata.id;
        let bytes = match MessageBuilder::serialize(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(sn = %sn, error = %e, "Response encode failed");
                continue;
            }
        };

        // A failed send must not stop the drain.
        if let Err(e) = socket.send_to(&bytes, client).await {
            error!(sn = %sn, client = %client, error = %e, "UDP send failed");
            continue;
        }

        info!(
            sn = %sn,
            id = response.metadata.id,
            cached = exchange.cached,
            rcode = ResponseParser::rcode_to_status(response.metadata.response_code),
            answers = response.answers.len(),
            "Answer written"
        );
    }

    debug!("UDP write loop exited");
}
