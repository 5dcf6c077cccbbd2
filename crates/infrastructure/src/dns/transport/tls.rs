//! DNS-over-TLS transport (RFC 7858)
//!
//! Every exchange opens a fresh connection: dial, TLS 1.3 handshake, one
//! length-prefixed query, one answer, close. Each pool member owns its own
//! `ClientConfig`, whose in-memory session store lets later handshakes
//! resume instead of running a full key exchange.

use super::tcp::{read_with_length_prefix, send_with_length_prefix};
use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use async_trait::async_trait;
use dotrelay_application::ports::{
    EndpointProber, ProbeFailure, ProbeOutcome, ProbeStage, UpstreamExchange,
};
use dotrelay_domain::{DomainError, ResolverEndpoint};
use hickory_proto::op::Message;
use rustls::client::Resumption;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, HandshakeKind, RootCertStore};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(1);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

const SESSION_CACHE_SIZE: usize = 64;

/// Installs the process-wide rustls crypto provider. Safe to call repeatedly.
pub fn ensure_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Trust anchors for upstream certificates. Hands out a new `ClientConfig`,
/// with its own session store, per pool member.
#[derive(Clone)]
pub struct TlsSettings {
    roots: Arc<RootCertStore>,
}

impl TlsSettings {
    /// Mozilla root program via `webpki-roots`.
    pub fn webpki() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(roots)
    }

    pub fn with_roots(roots: RootCertStore) -> Self {
        Self {
            roots: Arc::new(roots),
        }
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        ensure_crypto_provider();
        let mut config =
            ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
                .with_root_certificates(Arc::clone(&self.roots))
                .with_no_client_auth();
        config.resumption = Resumption::in_memory_sessions(SESSION_CACHE_SIZE);
        Arc::new(config)
    }
}

struct ConnectError {
    stage: ProbeStage,
    error: DomainError,
}

fn server_name(endpoint: &ResolverEndpoint) -> Result<ServerName<'static>, DomainError> {
    ServerName::try_from(endpoint.host().to_string()).map_err(|e| {
        DomainError::InvalidEndpoint(format!(
            "Invalid TLS server name '{}': {}",
            endpoint.host(),
            e
        ))
    })
}

/// TCP connect under [`DIAL_TIMEOUT`], then TLS handshake under [`HANDSHAKE_TIMEOUT`].
async fn connect(
    endpoint: &ResolverEndpoint,
    config: Arc<ClientConfig>,
) -> Result<TlsStream<TcpStream>, ConnectError> {
    let name = server_name(endpoint).map_err(|error| ConnectError {
        stage: ProbeStage::Dial,
        error,
    })?;
    let server = endpoint.to_string();

    let tcp_stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(endpoint.dial_target()))
        .await
        .map_err(|_| ConnectError {
            stage: ProbeStage::Dial,
            error: DomainError::TransportTimeout {
                server: server.clone(),
            },
        })?
        .map_err(|e| ConnectError {
            stage: ProbeStage::Dial,
            error: dial_error(&server, e),
        })?;
    let _ = tcp_stream.set_nodelay(true);

    let connector = TlsConnector::from(config);
    let tls_stream = tokio::time::timeout(HANDSHAKE_TIMEOUT, connector.connect(name, tcp_stream))
        .await
        .map_err(|_| ConnectError {
            stage: ProbeStage::Handshake,
            error: DomainError::TransportTimeout {
                server: server.clone(),
            },
        })?
        .map_err(|e| ConnectError {
            stage: ProbeStage::Handshake,
            error: DomainError::TransportHandshake {
                server: server.clone(),
                reason: e.to_string(),
            },
        })?;

    Ok(tls_stream)
}

fn dial_error(server: &str, e: io::Error) -> DomainError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => DomainError::TransportConnectionRefused {
            server: server.to_string(),
        },
        _ => DomainError::IoError(format!("Failed to connect to {}: {}", server, e)),
    }
}

/// Startup health probe: connect, handshake, close.
pub struct TlsProber {
    tls: TlsSettings,
}

impl TlsProber {
    pub fn new(tls: TlsSettings) -> Self {
        Self { tls }
    }
}

#[async_trait]
impl EndpointProber for TlsProber {
    async fn probe(&self, endpoint: &ResolverEndpoint) -> ProbeOutcome {
        let start = Instant::now();
        let result = connect(endpoint, self.tls.client_config()).await;
        let elapsed = start.elapsed();

        let result = match result {
            Ok(stream) => {
                drop(stream);
                Ok(())
            }
            Err(ConnectError { stage, error }) => Err(ProbeFailure {
                stage,
                reason: error.to_string(),
            }),
        };

        ProbeOutcome {
            endpoint: endpoint.clone(),
            elapsed,
            result,
        }
    }
}

/// A resolver pool member speaking DNS-over-TLS.
pub struct DotUpstream {
    endpoint: ResolverEndpoint,
    config: Arc<ClientConfig>,
    query_timeout: Duration,
}

impl DotUpstream {
    pub fn new(endpoint: ResolverEndpoint, tls: &TlsSettings, query_timeout: Duration) -> Self {
        Self {
            endpoint,
            config: tls.client_config(),
            query_timeout,
        }
    }
}

#[async_trait]
impl UpstreamExchange for DotUpstream {
    async fn exchange(&self, request: &Message) -> Result<Message, DomainError> {
        let start = Instant::now();
        let server = self.endpoint.to_string();
        let message_bytes = MessageBuilder::serialize(request)?;

        let mut stream = connect(&self.endpoint, Arc::clone(&self.config))
            .await
            .map_err(|e| e.error)?;
        let resumed = stream.get_ref().1.handshake_kind() == Some(HandshakeKind::Resumed);

        let response_bytes = tokio::time::timeout(self.query_timeout, async {
            send_with_length_prefix(&mut stream, &message_bytes).await?;
            read_with_length_prefix(&mut stream).await
        })
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.clone(),
        })??;

        let response =
            ResponseParser::parse_matching(&response_bytes, request.metadata.id, &server)?;

        debug!(
            server = %server,
            resumed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_len = response_bytes.len(),
            "DoT exchange completed"
        );

        Ok(response)
    }

    fn endpoint(&self) -> &ResolverEndpoint {
        &self.endpoint
    }
}
