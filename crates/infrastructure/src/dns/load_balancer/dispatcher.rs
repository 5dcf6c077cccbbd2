use dotrelay_application::Exchange;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use super::pool::ResolverPool;

/// Moves exchanges from the request channel through the pool and onto the
/// response channel, one task per exchange.
///
/// Finishes once the request channel is closed and every resolution it
/// started has handed its result to the response channel.
pub struct Dispatcher {
    handle: JoinHandle<()>,
}

impl Dispatcher {
    pub fn spawn(
        pool: Arc<ResolverPool>,
        requests: mpsc::Receiver<Exchange>,
        responses: mpsc::Sender<Exchange>,
    ) -> Self {
        let handle = tokio::spawn(run(pool, requests, responses));
        info!("Upstream dispatcher running");
        Self { handle }
    }

    /// Waits for the request channel to drain. Call after the front-end's
    /// read side has stopped.
    pub async fn stop(self) {
        info!("Upstream dispatcher stopping");
        let _ = self.handle.await;
        info!("Upstream dispatcher stopped");
    }
}

async fn run(
    pool: Arc<ResolverPool>,
    mut requests: mpsc::Receiver<Exchange>,
    responses: mpsc::Sender<Exchange>,
) {
    let tracker = TaskTracker::new();

    while let Some(exchange) = requests.recv().await {
        let pool = Arc::clone(&pool);
        let responses = responses.clone();
        tracker.spawn(async move {
            let sn = exchange.correlation;
            let Some(resolved) = pool.resolve(exchange).await else {
                return;
            };
            if responses.send(resolved).await.is_err() {
                debug!(sn = %sn, "Response channel closed before answer was written");
            }
        });
    }

    tracker.close();
    tracker.wait().await;
    debug!("Request channel drained");
}
