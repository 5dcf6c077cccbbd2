//! Startup health race: one surviving endpoint per resolver group.

use dotrelay_application::ports::EndpointProber;
use dotrelay_domain::{DomainError, ResolverEndpoint};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::scatter::scatter_gather;

/// Probes every group and keeps the fastest endpoint of each.
///
/// Within a group endpoints are deduplicated by host and probed
/// concurrently; the lowest successful elapsed time wins, ties going to the
/// endpoint listed first. Groups where nothing answers are dropped. Across
/// groups, a host already selected by an earlier group is discarded.
pub async fn select_fastest(
    groups: &[Vec<ResolverEndpoint>],
    prober: Arc<dyn EndpointProber>,
) -> Result<Vec<ResolverEndpoint>, DomainError> {
    if groups.is_empty() {
        return Err(DomainError::ConfigError(
            "No resolver groups configured".into(),
        ));
    }

    let mut selected: Vec<ResolverEndpoint> = Vec::with_capacity(groups.len());
    let mut hosts: FxHashSet<Arc<str>> = FxHashSet::default();

    for (group_index, group) in groups.iter().enumerate() {
        let Some(winner) = race_group(group, Arc::clone(&prober)).await else {
            warn!(group = group_index, "No endpoint in resolver group completed a handshake");
            continue;
        };

        if !hosts.insert(Arc::from(winner.host())) {
            info!(
                group = group_index,
                host = winner.host(),
                "Resolver already selected by an earlier group"
            );
            continue;
        }

        info!(group = group_index, server = %winner, "Resolver selected");
        selected.push(winner);
    }

    if selected.is_empty() {
        return Err(DomainError::NoHealthyResolvers);
    }
    Ok(selected)
}

async fn race_group(
    group: &[ResolverEndpoint],
    prober: Arc<dyn EndpointProber>,
) -> Option<ResolverEndpoint> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let unique: Vec<ResolverEndpoint> = group
        .iter()
        .filter(|endpoint| seen.insert(endpoint.host()))
        .cloned()
        .collect();

    let probes = unique.into_iter().map(|endpoint| {
        let prober = Arc::clone(&prober);
        async move { prober.probe(&endpoint).await }
    });
    let outcomes = scatter_gather(probes).await;

    let mut best: Option<(usize, Duration, ResolverEndpoint)> = None;
    for (index, outcome) in outcomes {
        if let Err(failure) = &outcome.result {
            warn!(
                server = %outcome.endpoint,
                stage = %failure.stage,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                reason = %failure.reason,
                "Resolver probe failed"
            );
            continue;
        }

        info!(
            server = %outcome.endpoint,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Resolver probe succeeded"
        );

        let better = match &best {
            None => true,
            Some((best_index, best_elapsed, _)) => {
                outcome.elapsed < *best_elapsed
                    || (outcome.elapsed == *best_elapsed && index < *best_index)
            }
        };
        if better {
            best = Some((index, outcome.elapsed, outcome.endpoint));
        }
    }

    best.map(|(_, _, endpoint)| endpoint)
}
