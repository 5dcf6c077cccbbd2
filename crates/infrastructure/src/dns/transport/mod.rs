pub mod tcp;
pub mod tls;

pub use tls::{ensure_crypto_provider, DotUpstream, TlsProber, TlsSettings};
