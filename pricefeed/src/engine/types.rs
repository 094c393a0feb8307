use serde::{Deserialize, Serialize};

use super::history::PriceHistory;

/// One price movement for one station.
///
/// `change` is the delta that was *requested* for the tick. The stored
/// `new_price` is rounded to two decimals and clamped at zero, so
/// `change` can differ slightly from the effective movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub station_id: String,
    pub new_price: f64,
    pub timestamp_ms: u64,
    pub change: f64,
}

/// Live price state for a single station.
#[derive(Debug, Clone)]
pub struct StationPriceRecord {
    /// Catalog price the record was seeded with.
    pub seed_price: f64,
    /// Equals the newest history entry's `new_price` once any update has
    /// been applied.
    pub current_price: f64,
    pub history: PriceHistory,
}

impl StationPriceRecord {
    pub fn seeded(price: f64, max_history_len: usize) -> Self {
        Self {
            seed_price: price,
            current_price: price,
            history: PriceHistory::new(max_history_len),
        }
    }

    pub fn apply(&mut self, update: PriceUpdate) {
        self.current_price = update.new_price;
        self.history.push(update);
    }
}
