use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one pass of a query through the pipeline.
///
/// `0` is reserved for queries the proxy issues to itself (cache refresh);
/// answers carrying it are absorbed into the cache and never written to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const INTERNAL: CorrelationId = CorrelationId(0);

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_internal(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly increasing source of client correlation ids, starting at 1.
#[derive(Debug)]
pub struct CorrelationSequence {
    next: AtomicU64,
}

impl CorrelationSequence {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> CorrelationId {
        CorrelationId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CorrelationSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_starts_after_sentinel() {
        let seq = CorrelationSequence::new();
        let first = seq.next_id();
        assert!(!first.is_internal());
        assert_eq!(first.get(), 1);
        assert!(seq.next_id() > first);
    }

    #[test]
    fn test_internal_sentinel() {
        assert!(CorrelationId::INTERNAL.is_internal());
        assert_eq!(CorrelationId::INTERNAL.to_string(), "0");
    }
}
