use chrono::{Local, TimeZone, Timelike, Utc};

/// Wall-clock milliseconds since the Unix epoch. Clocks before 1970 read 0.
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Local hour of day (0..=23) for an epoch-millisecond timestamp.
pub fn local_hour(ts_ms: u64) -> Option<u32> {
    let ts = i64::try_from(ts_ms).ok()?;
    Local
        .timestamp_millis_opt(ts)
        .single()
        .map(|dt| dt.hour())
}
