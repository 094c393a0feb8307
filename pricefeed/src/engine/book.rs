use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::drift::round_cents;
use super::types::{PriceUpdate, StationPriceRecord};
use crate::catalog::StationPrice;

/// Per-station price state, ordered by station id.
///
/// Only the tick writes prices; seeding replaces records wholesale.
#[derive(Debug)]
pub struct PriceBook {
    stations: BTreeMap<String, StationPriceRecord>,
    last_update_ms: u64,
    max_history_len: usize,
}

impl PriceBook {
    pub fn new(max_history_len: usize, now_ms: u64) -> Self {
        Self {
            stations: BTreeMap::new(),
            last_update_ms: now_ms,
            max_history_len,
        }
    }

    /// Reset a record per station to its catalog price with empty history.
    /// Returns the number of stations seeded.
    pub fn seed<I>(&mut self, stations: I) -> usize
    where
        I: IntoIterator<Item = StationPrice>,
    {
        let mut seeded = 0;

        for StationPrice { id, price } in stations {
            if !price.is_finite() {
                warn!(station_id = %id, price, "skipping station with non-finite catalog price");
                continue;
            }
            if price < 0.0 {
                warn!(station_id = %id, price, "negative catalog price clamped to zero");
            }

            self.stations.insert(
                id,
                StationPriceRecord::seeded(price.max(0.0), self.max_history_len),
            );
            seeded += 1;
        }

        debug!(seeded, total = self.stations.len(), "price book seeded");
        seeded
    }

    pub fn apply(&mut self, update: PriceUpdate) {
        match self.stations.get_mut(&update.station_id) {
            Some(record) => record.apply(update),
            None => {
                let mut record = StationPriceRecord::seeded(update.new_price, self.max_history_len);
                let id = update.station_id.clone();
                record.apply(update);
                self.stations.insert(id, record);
            }
        }
    }

    pub fn current_price(&self, station_id: &str) -> Option<f64> {
        self.stations.get(station_id).map(|r| r.current_price)
    }

    /// Newest-first history; empty for unknown stations.
    pub fn history(&self, station_id: &str) -> Vec<PriceUpdate> {
        self.stations
            .get(station_id)
            .map(|r| r.history.to_vec())
            .unwrap_or_default()
    }

    pub fn station_ids(&self) -> Vec<String> {
        self.stations.keys().cloned().collect()
    }

    /// Current price of every station as a zero-change update stamped with
    /// the last global update time.
    pub fn snapshot(&self) -> Vec<PriceUpdate> {
        self.stations
            .iter()
            .map(|(id, r)| PriceUpdate {
                station_id: id.clone(),
                new_price: r.current_price,
                timestamp_ms: self.last_update_ms,
                change: 0.0,
            })
            .collect()
    }

    /// Effective price movement since `since_ms`.
    ///
    /// The baseline is the newest update older than `since_ms`. When every
    /// retained update is inside the window, the baseline is the seed price,
    /// or the oldest retained price once retention has discarded entries.
    pub fn recent_change(&self, station_id: &str, since_ms: u64) -> Option<f64> {
        let record = self.stations.get(station_id)?;

        let baseline = match record.history.last_before(since_ms) {
            Some(u) => u.new_price,
            None if record.history.dropped() == 0 => record.seed_price,
            None => record
                .history
                .oldest()
                .map(|u| u.new_price)
                .unwrap_or(record.seed_price),
        };

        Some(round_cents(record.current_price - baseline))
    }

    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    pub fn set_last_update(&mut self, ts_ms: u64) {
        self.last_update_ms = ts_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> PriceBook {
        let mut b = PriceBook::new(100, 1_000);
        b.seed(vec![StationPrice::new("1", 85.50), StationPrice::new("2", 86.00)]);
        b
    }

    fn upd(id: &str, ts_ms: u64, price: f64, change: f64) -> PriceUpdate {
        PriceUpdate {
            station_id: id.into(),
            new_price: price,
            timestamp_ms: ts_ms,
            change,
        }
    }

    #[test]
    fn seeding_twice_does_not_duplicate_history() {
        let mut b = book();
        b.apply(upd("1", 2_000, 85.70, 0.2));

        b.seed(vec![StationPrice::new("1", 85.50), StationPrice::new("2", 86.00)]);

        assert_eq!(b.station_ids(), vec!["1", "2"]);
        assert_eq!(b.current_price("1"), Some(85.50));
        assert!(b.history("1").is_empty());
        assert!(b.history("2").is_empty());
    }

    #[test]
    fn current_price_tracks_history_head() {
        let mut b = book();
        b.apply(upd("1", 2_000, 85.70, 0.2));
        b.apply(upd("1", 3_000, 85.40, -0.3));

        let history = b.history("1");
        assert_eq!(history.len(), 2);
        assert_eq!(b.current_price("1"), Some(history[0].new_price));
        assert_eq!(history[0].timestamp_ms, 3_000);
    }

    #[test]
    fn unknown_station_is_absent() {
        let b = book();

        assert_eq!(b.current_price("99"), None);
        assert!(b.history("99").is_empty());
        assert!(b.recent_change("99", 0).is_none());
    }

    #[test]
    fn update_for_unseeded_station_creates_record() {
        let mut b = book();
        b.apply(upd("9", 2_000, 80.0, 0.1));

        assert_eq!(b.current_price("9"), Some(80.0));
        assert_eq!(b.history("9").len(), 1);
    }

    #[test]
    fn invalid_catalog_prices_are_sanitised() {
        let mut b = PriceBook::new(10, 0);
        let seeded = b.seed(vec![
            StationPrice::new("neg", -4.0),
            StationPrice::new("nan", f64::NAN),
        ]);

        assert_eq!(seeded, 1);
        assert_eq!(b.current_price("neg"), Some(0.0));
        assert_eq!(b.current_price("nan"), None);
    }

    #[test]
    fn snapshot_has_one_zero_change_entry_per_station() {
        let mut b = book();
        b.set_last_update(5_000);

        let snap = b.snapshot();

        assert_eq!(snap.len(), 2);
        assert!(snap.iter().all(|u| u.change == 0.0 && u.timestamp_ms == 5_000));
        assert_eq!(snap[0], upd("1", 5_000, 85.50, 0.0));
    }

    #[test]
    fn recent_change_uses_update_before_window_as_baseline() {
        let mut b = book();
        b.apply(upd("1", 2_000, 85.70, 0.2));
        b.apply(upd("1", 3_000, 85.90, 0.2));
        b.apply(upd("1", 4_000, 85.60, -0.3));

        assert_eq!(b.recent_change("1", 3_500), Some(-0.3));
        assert_eq!(b.recent_change("1", 0), Some(0.1));
    }

    #[test]
    fn recent_change_falls_back_to_oldest_retained_after_trimming() {
        let mut b = PriceBook::new(2, 0);
        b.seed(vec![StationPrice::new("1", 80.0)]);
        b.apply(upd("1", 1, 81.0, 1.0));
        b.apply(upd("1", 2, 82.0, 1.0));
        b.apply(upd("1", 3, 83.0, 1.0));

        assert_eq!(b.recent_change("1", 0), Some(1.0));
    }
}
