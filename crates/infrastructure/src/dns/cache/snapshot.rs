use hickory_proto::op::Message;
use hickory_proto::rr::{Name, Record, RecordType};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Value stored for one (name, type) pair.
#[derive(Debug, Clone)]
pub enum CachedAnswer {
    /// A/AAAA: the answer section, replayed into a freshly built reply.
    Records(Arc<[Record]>),
    /// Any other type: the whole upstream message, replayed with the id rewritten.
    Message(Arc<Message>),
}

/// `None` marks a known key without an answer; reads treat it as a miss.
pub type CacheSlot = Option<CachedAnswer>;

pub(crate) type TypeSlots = FxHashMap<RecordType, CacheSlot>;

/// Immutable two-level map `name -> (type -> slot)`.
///
/// Never mutated once published. [`CacheSnapshot::with_slot`] builds the
/// successor, sharing every per-name map except the one it touches.
#[derive(Debug, Default)]
pub struct CacheSnapshot {
    names: FxHashMap<Arc<str>, Arc<TypeSlots>>,
}

impl CacheSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.values().map(|slots| slots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn slot(&self, name: &str, record_type: RecordType) -> Option<&CacheSlot> {
        self.names.get(name)?.get(&record_type)
    }

    #[cfg(test)]
    fn slots_for(&self, name: &str) -> Option<&Arc<TypeSlots>> {
        self.names.get(name)
    }

    pub fn with_slot(&self, name: Arc<str>, record_type: RecordType, slot: CacheSlot) -> Self {
        let mut names =
            FxHashMap::with_capacity_and_hasher(self.names.len() + 1, Default::default());
        for (key, slots) in &self.names {
            names.insert(Arc::clone(key), Arc::clone(slots));
        }

        let mut slots = match self.names.get(&name) {
            Some(existing) => TypeSlots::clone(existing),
            None => TypeSlots::default(),
        };
        slots.insert(record_type, slot);
        names.insert(name, Arc::new(slots));

        Self { names }
    }

    /// Every concrete (name, type) pair; placeholders are skipped.
    pub fn keys(&self) -> FxHashMap<Arc<str>, Vec<RecordType>> {
        self.names
            .iter()
            .filter_map(|(name, slots)| {
                let types: Vec<RecordType> = slots
                    .iter()
                    .filter(|(_, slot)| slot.is_some())
                    .map(|(record_type, _)| *record_type)
                    .collect();
                (!types.is_empty()).then(|| (Arc::clone(name), types))
            })
            .collect()
    }
}

/// Cache key form of a question name: lower-cased, fully qualified.
pub fn cache_name(name: &Name) -> Arc<str> {
    let mut ascii = name.to_ascii().to_ascii_lowercase();
    if !ascii.ends_with('.') {
        ascii.push('.');
    }
    Arc::from(ascii)
}
