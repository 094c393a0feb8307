use async_trait::async_trait;

use super::{Station, StationCatalog, StationPrice};

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    stations: Vec<Station>,
}

impl StaticCatalog {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// The default Pune stations shipped with the app.
    pub fn builtin() -> Self {
        Self::new(vec![
            station("1", "City CNG Station", 18.5204, 73.8567, "FC Road, Pune", "24/7", 85.50, 4.5),
            station(
                "2",
                "Highway CNG Point",
                18.5714,
                73.8746,
                "Mumbai-Pune Highway, Pune",
                "6:00 AM - 11:00 PM",
                86.00,
                4.2,
            ),
            station("3", "Green Fuel Station", 18.4908, 73.8271, "Sinhagad Road, Pune", "24/7", 85.75, 4.7),
            station("4", "Express CNG Station", 18.5504, 73.8167, "Paud Road, Pune", "24/7", 85.90, 4.3),
            station(
                "5",
                "Metro CNG Point",
                18.5154,
                73.8867,
                "Nagar Road, Pune",
                "6:00 AM - 11:00 PM",
                85.80,
                4.6,
            ),
        ])
    }
}

#[async_trait]
impl StationCatalog for StaticCatalog {
    async fn load_stations(&self) -> anyhow::Result<Vec<StationPrice>> {
        Ok(self.stations.iter().map(StationPrice::from).collect())
    }
}

#[allow(clippy::too_many_arguments)]
fn station(
    id: &str,
    name: &str,
    latitude: f64,
    longitude: f64,
    address: &str,
    operating_hours: &str,
    price: f64,
    rating: f64,
) -> Station {
    Station {
        id: id.into(),
        name: name.into(),
        latitude,
        longitude,
        address: address.into(),
        operating_hours: operating_hours.into(),
        price,
        rating,
    }
}
