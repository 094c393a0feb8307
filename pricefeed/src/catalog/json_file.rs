use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use super::{Station, StationCatalog, StationPrice};

/// Catalog stored as a JSON array of [`Station`] records.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Decode a catalog document.
    pub fn parse(raw: &str) -> anyhow::Result<Vec<Station>> {
        serde_json::from_str(raw).context("decode station catalog")
    }
}

#[async_trait]
impl StationCatalog for JsonFileCatalog {
    async fn load_stations(&self) -> anyhow::Result<Vec<StationPrice>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read catalog {}", self.path.display()))?;

        let stations = Self::parse(&raw)
            .with_context(|| format!("invalid catalog {}", self.path.display()))?;

        debug!(path = %self.path.display(), count = stations.len(), "station catalog loaded");

        Ok(stations.iter().map(StationPrice::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"[
        {
            "id": "7",
            "name": "Ring Road CNG",
            "latitude": 18.6,
            "longitude": 73.9,
            "address": "Ring Road, Pune",
            "operatingHours": "24/7",
            "price": 84.25,
            "rating": 4.0
        }
    ]"#;

    #[test]
    fn parses_camel_case_records() {
        let stations = JsonFileCatalog::parse(DOC).unwrap();

        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].operating_hours, "24/7");
        assert_eq!(StationPrice::from(&stations[0]), StationPrice::new("7", 84.25));
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(JsonFileCatalog::parse(r#"[{"id": "1"}]"#).is_err());
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let catalog = JsonFileCatalog::new("/nonexistent/stations.json");

        let err = catalog.load_stations().await.unwrap_err();

        assert!(format!("{err:#}").contains("/nonexistent/stations.json"));
    }

    #[tokio::test]
    async fn loads_prices_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "pricefeed-catalog-{}-{}.json",
            std::process::id(),
            crate::time::now_ms()
        ));
        tokio::fs::write(&path, DOC).await.unwrap();

        let prices = JsonFileCatalog::new(&path).load_stations().await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(prices, vec![StationPrice::new("7", 84.25)]);
    }
}
