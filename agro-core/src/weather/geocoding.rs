use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;
use tracing::{info, instrument};

use crate::{
    config::WeatherSettings,
    error::AgroError,
    model::{Coordinates, GeocodedPlace},
    retry::RetryPolicy,
};

use super::{get_json, http_client, trim_base_url};

#[async_trait]
pub trait GeocodingClient: Send + Sync + Debug {
    /// Best match for `place_name`, or [`AgroError::NotFound`] when there is none.
    async fn lookup(&self, place_name: &str) -> Result<GeocodedPlace, AgroError>;

    async fn resolve(&self, place_name: &str) -> Result<Coordinates, AgroError> {
        Ok(self.lookup(place_name).await?.coordinates)
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    base_url: String,
    http: Client,
    retry: RetryPolicy,
}

impl OpenMeteoGeocoder {
    pub fn new(settings: &WeatherSettings, retry: RetryPolicy) -> Result<Self, AgroError> {
        Ok(Self {
            base_url: trim_base_url(&settings.geocoding_url),
            http: http_client(settings.timeout_secs)?,
            retry,
        })
    }

    async fn lookup_once(&self, name: &str) -> Result<GeocodedPlace, AgroError> {
        let request = self.http.get(format!("{}/search", self.base_url)).query(&[
            ("name", name),
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
        ]);

        let parsed: OmSearchResponse = get_json(request, "geocoding").await?;

        let hit = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AgroError::NotFound(name.to_string()))?;

        let coordinates = Coordinates::new(hit.latitude, hit.longitude).map_err(|_| {
            AgroError::MalformedResponse(format!(
                "geocoding returned out-of-range coordinates ({}, {}) for '{name}'",
                hit.latitude, hit.longitude
            ))
        })?;

        Ok(GeocodedPlace {
            name: hit.name,
            country: hit.country,
            timezone: hit.timezone,
            coordinates,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OmSearchResponse {
    // Open-Meteo omits the key entirely when nothing matches.
    #[serde(default)]
    results: Vec<OmPlace>,
}

#[derive(Debug, Deserialize)]
struct OmPlace {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    timezone: Option<String>,
}

#[async_trait]
impl GeocodingClient for OpenMeteoGeocoder {
    #[instrument(skip(self))]
    async fn lookup(&self, place_name: &str) -> Result<GeocodedPlace, AgroError> {
        let name = place_name.trim();
        if name.is_empty() {
            return Err(AgroError::InvalidInput("place name must not be empty".into()));
        }

        let place = self.retry.run("geocoding", || self.lookup_once(name)).await?;
        info!(place = %place.label(), coordinates = %place.coordinates, "Resolved place");
        Ok(place)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_results_key_parses_as_empty() {
        let parsed: OmSearchResponse =
            serde_json::from_str(r#"{"generationtime_ms": 0.4}"#).expect("parse");
        assert!(parsed.results.is_empty());
    }

    #[tokio::test]
    async fn blank_name_is_rejected_without_request() {
        let geocoder = OpenMeteoGeocoder::new(
            &WeatherSettings {
                geocoding_url: "http://127.0.0.1:9".into(),
                ..Default::default()
            },
            RetryPolicy::none(),
        )
        .expect("client");

        let err = geocoder.resolve("   ").await.unwrap_err();
        assert!(matches!(err, AgroError::InvalidInput(_)));
    }
}
