//! Bounded, insertion ordered probe history.

use std::collections::VecDeque;

use crate::record::ProbeRecord;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct ProbeStore {
    records: VecDeque<ProbeRecord>,
    capacity: usize,
}

impl Default for ProbeStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProbeStore {
    /// A store holding at most `capacity` records, never less than one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a record, evicting the oldest one first when full.
    pub fn append(&mut self, record: ProbeRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The newest record with this id that has not completed yet.
    ///
    /// Completed records are skipped, so correlating the same probe twice
    /// finds nothing the second time.
    pub fn find_latest_pending(&mut self, id: &str) -> Option<&mut ProbeRecord> {
        self.records
            .iter_mut()
            .rev()
            .find(|record| record.id == id && !record.is_completed())
    }

    /// The newest record with this id, completed or not.
    pub fn find_latest(&self, id: &str) -> Option<&ProbeRecord> {
        self.records.iter().rev().find(|record| record.id == id)
    }

    pub fn find_latest_mut(&mut self, id: &str) -> Option<&mut ProbeRecord> {
        self.records.iter_mut().rev().find(|record| record.id == id)
    }

    /// Clones of the `n` most recent records, oldest first.
    pub fn snapshot_recent(&self, n: usize) -> Vec<ProbeRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ProbeRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(id: usize) -> ProbeRecord {
        ProbeRecord::pending(format!("probe-{id}"), 1000, None)
    }

    fn ids(records: &[ProbeRecord]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn eviction_keeps_most_recent_in_order() {
        let mut store = ProbeStore::new(3);
        for id in 0..5 {
            store.append(record(id));
            assert!(store.len() <= store.capacity());
        }

        assert_eq!(store.len(), 3);
        let all = store.snapshot_recent(10);
        assert_eq!(ids(&all), ["probe-2", "probe-3", "probe-4"]);
    }

    #[test]
    fn snapshot_recent_is_oldest_first() {
        let mut store = ProbeStore::default();
        for id in 0..5 {
            store.append(record(id));
        }

        assert_eq!(ids(&store.snapshot_recent(2)), ["probe-3", "probe-4"]);
        assert!(store.snapshot_recent(0).is_empty());
    }

    #[test]
    fn evicted_ids_are_not_found() {
        let mut store = ProbeStore::new(2);
        for id in 0..3 {
            store.append(record(id));
        }

        assert!(store.find_latest_pending("probe-0").is_none());
        assert!(store.find_latest_pending("probe-1").is_some());
        assert!(store.find_latest_pending("probe-2").is_some());
    }

    #[test]
    fn completed_records_are_not_found_again() {
        let mut store = ProbeStore::default();
        store.append(record(1));

        let found = store.find_latest_pending("probe-1").expect("pending probe");
        found.mark_completed(1007, 7.25, "192.0.2.1".to_string());

        assert!(store.find_latest_pending("probe-1").is_none());
        let kept = store.iter().next().expect("record kept");
        assert_eq!(kept.duration, Some(7.25));
    }

    #[test]
    fn latest_duplicate_wins() {
        let mut store = ProbeStore::default();
        store.append(ProbeRecord::pending("dup".to_string(), 1, None));
        store.append(ProbeRecord::pending("dup".to_string(), 2, None));

        let found = store.find_latest_pending("dup").expect("pending probe");
        assert_eq!(found.sent_at, 2);
        found.mark_completed(3, 1.0, "peer".to_string());

        let found = store.find_latest_pending("dup").expect("older duplicate");
        assert_eq!(found.sent_at, 1);
    }

    #[test]
    fn failed_records_remain_correlatable() {
        let mut store = ProbeStore::default();
        store.append(ProbeRecord::failed(
            "f".to_string(),
            1,
            None,
            "timed out".to_string(),
        ));
        assert!(store.find_latest_pending("f").is_some());
    }

    #[test]
    fn find_latest_ignores_completion() {
        let mut store = ProbeStore::default();
        store.append(record(1));
        store
            .find_latest_mut("probe-1")
            .expect("record")
            .mark_completed(2, 1.0, "peer".to_string());

        assert!(store.find_latest("probe-1").is_some_and(ProbeRecord::is_completed));
        assert!(store.find_latest("probe-2").is_none());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut store = ProbeStore::new(0);
        store.append(record(1));
        store.append(record(2));
        assert_eq!(store.capacity(), 1);
        assert_eq!(ids(&store.snapshot_recent(5)), ["probe-2"]);
    }
}
