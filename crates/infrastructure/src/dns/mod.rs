pub mod cache;
pub mod forwarding;
pub mod load_balancer;
pub mod server;
pub mod subnet;
pub mod transport;

pub use cache::AnswerCache;
pub use forwarding::{MessageBuilder, ResponseParser};
pub use load_balancer::{select_fastest, Dispatcher, ResolverPool, TcpReachability};
pub use server::{FrontEndSettings, FrontEndState, PipelineChannels, UdpFrontEnd};
pub use subnet::{SubnetDescriptor, SubnetPolicy};
pub use transport::{ensure_crypto_provider, DotUpstream, TlsProber, TlsSettings};
