pub mod catalog;
pub mod config;
pub mod engine;

pub mod error;
pub mod time;

pub use engine::{PriceUpdate, PriceUpdateEngine, Subscription};
