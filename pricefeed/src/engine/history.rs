use std::collections::VecDeque;

use super::types::PriceUpdate;

/// Bounded newest-first update history for a station.
///
/// Retention is count based: once `max_len` entries are held, pushing a new
/// update drops the oldest one.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    /// Newest entry at the front.
    entries: VecDeque<PriceUpdate>,

    max_len: usize,

    /// Entries discarded by retention so far.
    dropped: u64,
}

impl PriceHistory {
    pub fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            entries: VecDeque::with_capacity(max_len.min(128)),
            max_len,
            dropped: 0,
        }
    }

    pub fn push(&mut self, update: PriceUpdate) {
        self.entries.push_front(update);
        if self.entries.len() > self.max_len {
            self.entries.truncate(self.max_len);
            self.dropped += 1;
        }
    }

    pub fn oldest(&self) -> Option<&PriceUpdate> {
        self.entries.back()
    }

    /// Newest entry strictly older than `ts_ms`.
    pub fn last_before(&self, ts_ms: u64) -> Option<&PriceUpdate> {
        self.entries.iter().find(|u| u.timestamp_ms < ts_ms)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn to_vec(&self) -> Vec<PriceUpdate> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upd(ts_ms: u64, price: f64) -> PriceUpdate {
        PriceUpdate {
            station_id: "1".into(),
            new_price: price,
            timestamp_ms: ts_ms,
            change: 0.0,
        }
    }

    #[test]
    fn newest_entry_comes_first() {
        let mut h = PriceHistory::new(10);
        h.push(upd(1, 85.0));
        h.push(upd(2, 85.1));

        assert_eq!(h.oldest().unwrap().timestamp_ms, 1);
        assert_eq!(h.to_vec(), vec![upd(2, 85.1), upd(1, 85.0)]);
    }

    #[test]
    fn oldest_entries_are_dropped_at_capacity() {
        let mut h = PriceHistory::new(3);
        for ts in 0..10 {
            h.push(upd(ts, 80.0 + ts as f64));
        }

        assert_eq!(h.dropped(), 7);
        let ts: Vec<u64> = h.to_vec().iter().map(|u| u.timestamp_ms).collect();
        assert_eq!(ts, vec![9, 8, 7]);
    }

    #[test]
    fn zero_capacity_keeps_one_entry() {
        let mut h = PriceHistory::new(0);
        h.push(upd(1, 85.0));
        h.push(upd(2, 86.0));

        assert_eq!(h.to_vec(), vec![upd(2, 86.0)]);
        assert_eq!(h.dropped(), 1);
    }

    #[test]
    fn last_before_skips_entries_inside_window() {
        let mut h = PriceHistory::new(10);
        h.push(upd(100, 85.0));
        h.push(upd(200, 85.5));
        h.push(upd(300, 86.0));

        assert_eq!(h.last_before(250).unwrap().timestamp_ms, 200);
        assert!(h.last_before(100).is_none());
    }
}
