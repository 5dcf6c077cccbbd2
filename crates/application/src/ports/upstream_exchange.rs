use async_trait::async_trait;
use dotrelay_domain::{DomainError, ResolverEndpoint};
use hickory_proto::op::Message;

/// One member of the upstream pool: sends a single request and returns the
/// decoded answer whose transaction id matches.
#[async_trait]
pub trait UpstreamExchange: Send + Sync {
    async fn exchange(&self, request: &Message) -> Result<Message, DomainError>;

    fn endpoint(&self) -> &ResolverEndpoint;
}
