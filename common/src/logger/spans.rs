use tracing::{Level, Span};

/// Span wrapping one price tick. `seq` increases by one per tick and engine.
pub fn tick_span(seq: u64) -> Span {
    tracing::span!(Level::INFO, "price_tick", seq)
}
