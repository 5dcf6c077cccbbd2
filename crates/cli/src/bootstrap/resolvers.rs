use dotrelay_application::ports::{EndpointProber, UpstreamExchange};
use dotrelay_domain::Config;
use dotrelay_infrastructure::dns::{
    select_fastest, DotUpstream, ResolverPool, SubnetPolicy, TcpReachability, TlsProber,
    TlsSettings,
};
use std::sync::Arc;
use tracing::info;

/// Races every configured group and builds the pool from the winners.
pub async fn build_resolver_pool(
    config: &Config,
    subnet: SubnetPolicy,
) -> anyhow::Result<ResolverPool> {
    let groups = config.dns.resolver_groups()?;
    let tls = TlsSettings::webpki();

    info!(groups = groups.len(), "Probing upstream resolvers");
    let prober: Arc<dyn EndpointProber> = Arc::new(TlsProber::new(tls.clone()));
    let selected = select_fastest(&groups, prober).await?;

    let query_timeout = config.dns.query_timeout();
    let members: Vec<Arc<dyn UpstreamExchange>> = selected
        .into_iter()
        .map(|endpoint| {
            Arc::new(DotUpstream::new(endpoint, &tls, query_timeout)) as Arc<dyn UpstreamExchange>
        })
        .collect();

    let pool = ResolverPool::new(
        members,
        Arc::new(subnet),
        Arc::new(TcpReachability::new()),
    )?;
    Ok(pool)
}
