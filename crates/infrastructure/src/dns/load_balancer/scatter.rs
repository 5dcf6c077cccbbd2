use std::future::Future;
use tokio::task::JoinSet;
use tracing::warn;

/// Runs every future on its own task and waits for all of them.
///
/// Results come back in completion order, each tagged with the index of the
/// future that produced it. The set is always joined to the end, so callers
/// can make their decision from the full vector without leaving producers
/// behind. A task that panics is logged and omitted.
pub async fn scatter_gather<I, F, T>(futures: I) -> Vec<(usize, T)>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    for (index, fut) in futures.into_iter().enumerate() {
        set.spawn(async move { (index, fut.await) });
    }

    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!(error = %e, "Scatter task failed"),
        }
    }
    results
}
