//! Price drift model.
//!
//! A tick moves a station's price by `trend + noise`:
//!   • trend: `sin(hour / 24 · 2π) · amplitude`, one up-and-down cycle per day
//!   • noise: uniform in `[-max_change, +max_change]`
//!
//! The resulting price is rounded to two decimals and clamped at zero.

use std::f64::consts::TAU;

use rand::Rng;

use crate::config::{DEFAULT_MAX_PRICE_CHANGE, DEFAULT_TREND_AMPLITUDE, drift_bound};
use crate::error::PriceFeedError;
use crate::time::local_hour;

#[derive(Debug, Clone, Copy)]
pub struct PriceDrift {
    pub max_change: f64,
    pub trend_amplitude: f64,
}

impl PriceDrift {
    /// Non-finite terms fall back to the defaults and oversized ones are
    /// clamped, so the noise range is always valid for `gen_range`.
    pub fn new(max_change: f64, trend_amplitude: f64) -> Self {
        Self {
            max_change: drift_bound("max_price_change", max_change, DEFAULT_MAX_PRICE_CHANGE).abs(),
            trend_amplitude: drift_bound(
                "trend_amplitude",
                trend_amplitude,
                DEFAULT_TREND_AMPLITUDE,
            ),
        }
    }

    /// Requested delta for a tick at `ts_ms` (local time of day).
    pub fn delta_at<R: Rng>(&self, ts_ms: u64, rng: &mut R) -> Result<f64, PriceFeedError> {
        let hour = local_hour(ts_ms)
            .ok_or_else(|| PriceFeedError::Tick(format!("timestamp {ts_ms} has no local time")))?;
        let delta = self.delta_for_hour(hour, rng);
        if !delta.is_finite() {
            return Err(PriceFeedError::Tick(format!("drift produced {delta}")));
        }
        Ok(delta)
    }

    pub fn delta_for_hour<R: Rng>(&self, hour: u32, rng: &mut R) -> f64 {
        diurnal_trend(hour, self.trend_amplitude) + self.noise(rng)
    }

    fn noise<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.max_change > 0.0 {
            rng.gen_range(-self.max_change..=self.max_change)
        } else {
            0.0
        }
    }
}

pub fn diurnal_trend(hour: u32, amplitude: f64) -> f64 {
    (f64::from(hour % 24) / 24.0 * TAU).sin() * amplitude
}

/// Price after applying `delta`: rounded to paise, never negative.
pub fn apply_delta(current: f64, delta: f64) -> f64 {
    round_cents(current + delta).max(0.0)
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
