use crate::dns::cache::AnswerCache;
use crate::dns::forwarding::MessageBuilder;
use dotrelay_application::Exchange;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Periodically re-asks upstream for every cached (name, type).
///
/// Queries go through the live request channel as internal exchanges, so
/// their answers replace the cached ones on the way back.
pub(super) async fn run_refresh(
    cache: Arc<AnswerCache>,
    requests: mpsc::Sender<Exchange>,
    every: Duration,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the cache is empty then.
    interval.tick().await;

    let mut round: u64 = 0;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Cache refresh stopped");
                break;
            }
            _ = interval.tick() => {
                round += 1;
                let sent = sweep(&cache, &requests, &running).await;
                info!(round, queries = sent, "Cache refresh sweep finished");
            }
        }
    }
}

async fn sweep(
    cache: &AnswerCache,
    requests: &mpsc::Sender<Exchange>,
    running: &AtomicBool,
) -> usize {
    let mut sent = 0;
    for (name, record_types) in cache.all_keys() {
        if !running.load(Ordering::Acquire) {
            info!("Cache refresh interrupted by shutdown");
            break;
        }
        for record_type in record_types {
            let query = match MessageBuilder::refresh_query(&name, record_type) {
                Ok(query) => query,
                Err(e) => {
                    warn!(name = %name, record_type = %record_type, error = %e, "Skipping refresh");
                    continue;
                }
            };
            if requests.send(Exchange::internal(query)).await.is_err() {
                return sent;
            }
            sent += 1;
        }
    }
    sent
}
