use dotrelay_domain::ResolverEndpoint;
use dotrelay_infrastructure::dns::transport::tcp::{
    read_with_length_prefix, send_with_length_prefix,
};
use dotrelay_infrastructure::dns::{ensure_crypto_provider, MessageBuilder, TlsSettings};
use hickory_proto::op::Message;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

type Handler = Arc<dyn Fn(Message) -> Message + Send + Sync>;

/// Local DNS-over-TLS server with a self-signed certificate for 127.0.0.1.
pub struct DotTestServer {
    addr: SocketAddr,
    certificate: CertificateDer<'static>,
    pub connections: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl DotTestServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(Message) -> Message + Send + Sync + 'static,
    {
        ensure_crypto_provider();

        let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        let certificate = certified.cert.der().clone();
        let key =
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

        let config =
            rustls::ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
                .with_no_client_auth()
                .with_single_cert(vec![certificate.clone()], key)
                .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let handler: Handler = Arc::new(handler);

        let counter = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((tcp, _)) = accepted else { continue };
                        counter.fetch_add(1, Ordering::SeqCst);
                        let acceptor = acceptor.clone();
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            let Ok(mut tls) = acceptor.accept(tcp).await else { return };
                            let Ok(bytes) = read_with_length_prefix(&mut tls).await else { return };
                            let Ok(request) = Message::from_vec(&bytes) else { return };
                            let reply = handler(request);
                            let Ok(out) = MessageBuilder::serialize(&reply) else { return };
                            let _ = send_with_length_prefix(&mut tls, &out).await;
                        });
                    }
                }
            }
        });

        Self {
            addr,
            certificate,
            connections,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn endpoint(&self) -> ResolverEndpoint {
        ResolverEndpoint::new("127.0.0.1", self.addr.port())
    }

    /// Client settings trusting only this server's certificate.
    pub fn tls_settings(&self) -> TlsSettings {
        let mut roots = RootCertStore::empty();
        roots.add(self.certificate.clone()).unwrap();
        TlsSettings::with_roots(roots)
    }
}

impl Drop for DotTestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
