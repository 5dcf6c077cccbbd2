use super::snapshot::{cache_name, CacheSnapshot, CachedAnswer};
use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use arc_swap::{ArcSwap, ArcSwapOption};
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// In-memory answer cache keyed by (question name, question type).
///
/// Readers load the current [`CacheSnapshot`] without locking. Every write
/// goes through a single updater task which builds the next snapshot by
/// copy-on-write and publishes it with one atomic store, so writes are
/// applied in submission order and a reader never sees a partial update.
pub struct AnswerCache {
    snapshot: Arc<ArcSwap<CacheSnapshot>>,
    enabled: AtomicBool,
    updates: ArcSwapOption<mpsc::UnboundedSender<Message>>,
    updater: Mutex<Option<JoinHandle<()>>>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(ArcSwap::from_pointee(CacheSnapshot::empty())),
            enabled: AtomicBool::new(false),
            updates: ArcSwapOption::empty(),
            updater: Mutex::new(None),
        }
    }

    /// Installs an empty snapshot and spawns the updater. Calling it on a
    /// running cache does nothing.
    pub fn start(&self) {
        if self.enabled.swap(true, Ordering::AcqRel) {
            return;
        }

        self.snapshot.store(Arc::new(CacheSnapshot::empty()));

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_updater(Arc::clone(&self.snapshot), rx));

        self.updates.store(Some(Arc::new(tx)));
        *self.updater.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!("Answer cache started");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Answers `request` from the current snapshot.
    ///
    /// A/AAAA hits are rebuilt as a reply to `request` around the cached
    /// records; other types return a copy of the cached message carrying the
    /// request's transaction id.
    pub fn get(&self, request: &Message) -> Option<Message> {
        if !self.is_enabled() {
            return None;
        }

        let question = request.queries.first()?;
        let name = cache_name(question.name());
        let record_type = question.query_type();

        let snapshot = self.snapshot.load();
        let answer = snapshot.slot(&name, record_type)?.as_ref()?;

        let reply = match answer {
            CachedAnswer::Records(records) => MessageBuilder::reply(request, records.to_vec()),
            CachedAnswer::Message(message) => {
                let mut reply = Message::clone(message);
                reply.metadata.id = request.metadata.id;
                reply
            }
        };

        debug!(name = %name, record_type = %record_type, "Answer cache hit");
        Some(reply)
    }

    /// Queues a successful upstream answer for the updater.
    ///
    /// Rejected when the cache is stopped or the answer is not a NOERROR
    /// with at least one answer record. Never blocks.
    pub fn update(&self, response: Option<&Message>) {
        if !self.is_enabled() {
            return;
        }
        let Some(response) = response else {
            return;
        };
        if !ResponseParser::is_success(response)
            || response.answers.is_empty()
            || response.queries.is_empty()
        {
            return;
        }

        let Some(sender) = self.updates.load_full() else {
            return;
        };
        // Closed channel means stop() won the race.
        let _ = sender.send(response.clone());
    }

    /// Point-in-time view of every cached (name, types) pair.
    pub fn all_keys(&self) -> FxHashMap<Arc<str>, Vec<RecordType>> {
        self.snapshot.load().keys()
    }

    /// Number of concrete entries plus placeholders in the current snapshot.
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Disables the cache, closes the update queue and waits for the updater
    /// to apply everything already queued.
    pub async fn stop(&self) {
        self.enabled.store(false, Ordering::Release);

        // In-flight `update` calls hold their own sender clone; the updater
        // keeps draining until the last one is dropped.
        drop(self.updates.swap(None));

        let handle = self
            .updater
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
            info!(entries = self.len(), "Answer cache stopped");
        }
    }

    #[cfg(test)]
    pub(crate) fn publish(&self, snapshot: CacheSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_updater(
    snapshot: Arc<ArcSwap<CacheSnapshot>>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(response) = rx.recv().await {
        let Some(question) = response.queries.first() else {
            continue;
        };
        let name = cache_name(question.name());
        let record_type = question.query_type();

        let answer = if ResponseParser::is_address_type(record_type) {
            CachedAnswer::Records(Arc::from(response.answers.clone()))
        } else {
            CachedAnswer::Message(Arc::new(response))
        };

        let next = snapshot
            .load()
            .with_slot(Arc::clone(&name), record_type, Some(answer));
        snapshot.store(Arc::new(next));

        debug!(name = %name, record_type = %record_type, "Answer cache updated");
    }

    debug!("Answer cache updater exited");
}
