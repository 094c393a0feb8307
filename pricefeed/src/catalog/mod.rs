//! Station catalog
//!
//! The catalog is the authoritative list of stations. The price engine only
//! reads `(id, price)` pairs from it, once, to seed its book.

mod builtin;
mod json_file;

pub use builtin::StaticCatalog;
pub use json_file::JsonFileCatalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Seed price for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationPrice {
    pub id: String,
    /// Currency per kg.
    pub price: f64,
}

impl StationPrice {
    pub fn new(id: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            price,
        }
    }
}

/// Full catalog record for a CNG station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub operating_hours: String,
    pub price: f64,
    pub rating: f64,
}

impl From<&Station> for StationPrice {
    fn from(s: &Station) -> Self {
        StationPrice::new(s.id.clone(), s.price)
    }
}

/// Source of stations used to seed the price engine.
#[async_trait]
pub trait StationCatalog: Send + Sync {
    async fn load_stations(&self) -> anyhow::Result<Vec<StationPrice>>;
}
