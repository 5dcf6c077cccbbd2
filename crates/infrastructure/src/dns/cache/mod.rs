mod answer_cache;
mod snapshot;

pub use answer_cache::AnswerCache;
pub use snapshot::{cache_name, CacheSlot, CacheSnapshot, CachedAnswer};
