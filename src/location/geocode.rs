use async_trait::async_trait;
use reverse_geocoder::ReverseGeocoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("geocode lookup failed: {0}")]
    Lookup(String),

    #[error("no place record near {latitude}, {longitude}")]
    NoMatch { latitude: f64, longitude: f64 },
}

/// The place record a lookup resolves a coordinate to.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub city: String,
    pub country_code: String,
    pub country_name: Option<String>,
}

/// External geocoding facility. Implementations may be remote services; the
/// default [`CityGeocoder`] works offline.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Place, GeocodeError>;
}

/// Offline reverse geocoder over the embedded cities dataset.
pub struct CityGeocoder {
    geocoder: ReverseGeocoder,
}

impl CityGeocoder {
    pub fn new() -> Self {
        Self {
            geocoder: ReverseGeocoder::new(),
        }
    }
}

impl Default for CityGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for CityGeocoder {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Place, GeocodeError> {
        let search_result = self.geocoder.search((latitude, longitude));
        let record = search_result.record;
        let country_name = rust_iso3166::from_alpha2(&record.cc).map(|c| c.name.to_string());
        Ok(Place {
            city: record.name.clone(),
            country_code: record.cc.clone(),
            country_name,
        })
    }
}
