use std::collections::HashSet;

use crate::identity::RecordIdentity;

// Upper bound on the capacity hint taken from --input-record
const MAX_PREALLOCATED_IDENTITIES: usize = 10_000_000;

/// Every distinct record identity seen during one validation run. How often an
/// identity was seen is not tracked, only whether it was.
#[derive(Debug, Default)]
pub struct DeduplicationLedger {
    seen: HashSet<RecordIdentity>,
}

impl DeduplicationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected(expected: u64) -> Self {
        let capacity = usize::try_from(expected)
            .unwrap_or(usize::MAX)
            .min(MAX_PREALLOCATED_IDENTITIES);
        Self {
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Returns true if this is the first time the identity was seen
    pub fn insert(&mut self, identity: RecordIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn contains(&self, identity: RecordIdentity) -> bool {
        self.seen.contains(&identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut ledger = DeduplicationLedger::new();
        assert!(ledger.insert(10029999));
        for _ in 0..5 {
            assert!(!ledger.insert(10029999));
        }
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(10029999));
    }

    #[test]
    fn test_counts_distinct_identities() {
        let mut ledger = DeduplicationLedger::with_expected(3);
        assert!(ledger.is_empty());
        for id in [1, 2, 3, 2, 1] {
            ledger.insert(id);
        }
        assert_eq!(ledger.len(), 3);
        assert!(!ledger.contains(4));
    }

    #[test]
    fn test_huge_expectation_does_not_overallocate() {
        let ledger = DeduplicationLedger::with_expected(u64::MAX);
        assert!(ledger.is_empty());
    }
}
