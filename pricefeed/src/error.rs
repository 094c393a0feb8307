use thiserror::Error;

/// Failures inside the price feed. None of these are returned to callers of
/// the public engine API; they are logged where they are caught.
#[derive(Error, Debug)]
pub enum PriceFeedError {
    #[error("station catalog failed to load: {0}")]
    Seeding(String),

    #[error("listener {listener_id} failed: {reason}")]
    Listener { listener_id: u64, reason: String },

    #[error("price tick failed: {0}")]
    Tick(String),

    #[error("update interval of {0} minutes is below the 1 minute minimum")]
    InvalidInterval(f64),
}
