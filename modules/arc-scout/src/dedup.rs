use std::collections::HashSet;

use arc_common::{RecordKey, Stage};

/// Remembers every (record key, stage) pair accepted during one page session.
///
/// The same key may be uploaded once per distinct stage, never twice for the same one.
/// There is no eviction: a ledger lives for a single page view.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<(RecordKey, Stage)>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a pair is offered (and marks it seen), false ever after.
    pub fn should_enqueue(&mut self, key: &RecordKey, stage: &Stage) -> bool {
        self.seen.insert((key.clone(), stage.clone()))
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
    fn accepts_each_pair_once() {
        let mut ledger = DedupLedger::new();
        let key = RecordKey::new("k");
        assert!(ledger.should_enqueue(&key, &Stage::base()));
        assert!(!ledger.should_enqueue(&key, &Stage::base()));
        assert!(!ledger.should_enqueue(&key, &Stage::base()));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn same_key_passes_once_per_stage() {
        let mut ledger = DedupLedger::new();
        let key = RecordKey::new("k");
        assert!(ledger.should_enqueue(&key, &Stage::base()));
        assert!(ledger.should_enqueue(&key, &Stage::enriched()));
        assert!(!ledger.should_enqueue(&key, &Stage::enriched()));
        assert_eq!(ledger.len(), 2);
    }
}
