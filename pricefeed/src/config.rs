use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Shortest cadence the engine accepts.
pub const MIN_UPDATE_INTERVAL_MINUTES: f64 = 1.0;

pub const DEFAULT_MAX_PRICE_CHANGE: f64 = 0.5;
pub const DEFAULT_TREND_AMPLITUDE: f64 = 0.1;

/// Largest magnitude accepted for either drift term, per tick.
pub const MAX_DRIFT_BOUND: f64 = 1_000.0;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    // =========================
    // Cadence
    // =========================
    /// Time between ticks while connected.
    ///
    /// Never below one minute; see [`interval_from_minutes`].
    pub update_interval: Duration,

    /// Maximum number of stations whose price moves in a single tick.
    ///
    /// Models "some stations changed price" rather than the whole catalog
    /// moving at once. Smaller catalogs move every station.
    pub update_batch_size: usize,

    // =========================
    // Drift
    // =========================
    /// Bound of the uniform noise term, in currency units per kg.
    pub max_price_change: f64,

    /// Amplitude of the 24-hour trend term.
    pub trend_amplitude: f64,

    /// Price assumed for a selected station that has no record.
    pub fallback_price: f64,

    /// Fixed RNG seed. `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,

    // =========================
    // Retention
    // =========================
    /// History entries kept per station; oldest are dropped first.
    pub max_history_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(5 * 60),
            update_batch_size: 3,
            max_price_change: DEFAULT_MAX_PRICE_CHANGE,
            trend_amplitude: DEFAULT_TREND_AMPLITUDE,
            fallback_price: 85.0,
            rng_seed: None,
            max_history_len: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys use defaults,
    /// unparseable ones log a warning and use defaults too.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        let minutes = parse_or(
            &lookup,
            "PRICE_UPDATE_INTERVAL_MINUTES",
            d.update_interval.as_secs_f64() / 60.0,
        );
        let (update_interval, clamped) = interval_from_minutes(minutes);
        if clamped {
            warn!(minutes, "configured update interval below 1 minute; using 1 minute");
        }

        Self {
            update_interval,
            update_batch_size: parse_or(&lookup, "PRICE_BATCH_SIZE", d.update_batch_size),
            max_price_change: drift_bound(
                "PRICE_MAX_CHANGE",
                parse_or(&lookup, "PRICE_MAX_CHANGE", d.max_price_change),
                d.max_price_change,
            )
            .abs(),
            trend_amplitude: drift_bound(
                "PRICE_TREND_AMPLITUDE",
                parse_or(&lookup, "PRICE_TREND_AMPLITUDE", d.trend_amplitude),
                d.trend_amplitude,
            ),
            fallback_price: finite_or(
                "PRICE_FALLBACK",
                parse_or(&lookup, "PRICE_FALLBACK", d.fallback_price),
                d.fallback_price,
            )
            .max(0.0),
            rng_seed: lookup("PRICE_RNG_SEED").and_then(|v| v.parse().ok()),
            max_history_len: parse_or(&lookup, "PRICE_HISTORY_LEN", d.max_history_len).max(1),
        }
    }
}

/// Process-level settings for the `pricefeed` binary.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub engine: EngineConfig,

    /// JSON station catalog. The built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,

    /// Emit JSON logs instead of pretty text.
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            engine: EngineConfig::from_lookup(&lookup),
            catalog_path: lookup("PRICE_CATALOG_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            json_logs: lookup("APP_ENV").as_deref() == Some("production"),
        }
    }
}

/// Convert a cadence in minutes to a `Duration`.
///
/// Values below [`MIN_UPDATE_INTERVAL_MINUTES`], and NaN, become one minute.
/// The flag reports whether clamping happened.
pub fn interval_from_minutes(minutes: f64) -> (Duration, bool) {
    let clamped = minutes.is_nan() || minutes < MIN_UPDATE_INTERVAL_MINUTES;
    let minutes = if clamped {
        MIN_UPDATE_INTERVAL_MINUTES
    } else {
        minutes.min(f64::from(u32::MAX))
    };
    (Duration::from_secs_f64(minutes * 60.0), clamped)
}

/// Keep a drift term finite and within [`MAX_DRIFT_BOUND`].
///
/// Non-finite values use `default`; oversized ones are clamped.
pub fn drift_bound(name: &str, value: f64, default: f64) -> f64 {
    let value = finite_or(name, value, default);
    if value.abs() > MAX_DRIFT_BOUND {
        warn!(name, value, limit = MAX_DRIFT_BOUND, "drift setting too large; clamping");
        return value.clamp(-MAX_DRIFT_BOUND, MAX_DRIFT_BOUND);
    }
    value
}

fn finite_or(name: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(name, value, default, "non-finite config value; using default");
        default
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid config value; using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn interval_below_one_minute_is_clamped() {
        for m in [0.0, -3.0, 0.5, f64::NAN, f64::NEG_INFINITY] {
            let (d, clamped) = interval_from_minutes(m);
            assert_eq!(d, Duration::from_secs(60), "minutes = {m}");
            assert!(clamped);
        }
    }

    #[test]
    fn interval_at_or_above_minimum_is_kept() {
        assert_eq!(interval_from_minutes(1.0), (Duration::from_secs(60), false));
        assert_eq!(interval_from_minutes(2.5), (Duration::from_secs(150), false));
    }

    #[test]
    fn defaults_match_engine_constants() {
        let cfg = EngineConfig::from_lookup(|_| None);
        assert_eq!(cfg.update_interval, Duration::from_secs(300));
        assert_eq!(cfg.update_batch_size, 3);
        assert_eq!(cfg.max_history_len, 100);
        assert_eq!(cfg.max_price_change, 0.5);
        assert_eq!(cfg.trend_amplitude, 0.1);
        assert_eq!(cfg.fallback_price, 85.0);
        assert!(cfg.rng_seed.is_none());
    }

    #[test]
    fn env_values_override_defaults() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("PRICE_UPDATE_INTERVAL_MINUTES", "2"),
            ("PRICE_BATCH_SIZE", "5"),
            ("PRICE_RNG_SEED", "42"),
            ("PRICE_CATALOG_PATH", "/tmp/stations.json"),
            ("APP_ENV", "production"),
        ]));

        assert_eq!(cfg.engine.update_interval, Duration::from_secs(120));
        assert_eq!(cfg.engine.update_batch_size, 5);
        assert_eq!(cfg.engine.rng_seed, Some(42));
        assert_eq!(cfg.catalog_path, Some(PathBuf::from("/tmp/stations.json")));
        assert!(cfg.json_logs);
    }

    #[test]
    fn garbage_values_fall_back_to_defaults() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("PRICE_BATCH_SIZE", "lots"),
            ("PRICE_UPDATE_INTERVAL_MINUTES", "0"),
            ("PRICE_HISTORY_LEN", "0"),
        ]));

        assert_eq!(cfg.update_batch_size, 3);
        assert_eq!(cfg.update_interval, Duration::from_secs(60));
        assert_eq!(cfg.max_history_len, 1);
    }

    #[test]
    fn drift_settings_are_kept_finite_and_bounded() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("PRICE_MAX_CHANGE", "1e308"),
            ("PRICE_TREND_AMPLITUDE", "NaN"),
            ("PRICE_FALLBACK", "inf"),
        ]));

        assert_eq!(cfg.max_price_change, MAX_DRIFT_BOUND);
        assert_eq!(cfg.trend_amplitude, DEFAULT_TREND_AMPLITUDE);
        assert_eq!(cfg.fallback_price, 85.0);

        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("PRICE_MAX_CHANGE", "-inf"),
            ("PRICE_TREND_AMPLITUDE", "-5000"),
        ]));

        assert_eq!(cfg.max_price_change, DEFAULT_MAX_PRICE_CHANGE);
        assert_eq!(cfg.trend_amplitude, -MAX_DRIFT_BOUND);
    }
}
