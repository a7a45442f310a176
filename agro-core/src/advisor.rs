use std::collections::BTreeSet;
use tracing::{info, instrument};

use crate::{
    Config,
    advisory::AdvisoryComposer,
    config::default_forecast_days,
    error::AgroError,
    model::{
        AdvisoryKind, AdvisoryRequest, Coordinates, ForecastSeries, GeocodedPlace, Location,
        Metric,
    },
    weather::{
        ForecastClient, GeocodingClient, OpenMeteoForecast, OpenMeteoGeocoder,
        forecast::MAX_FORECAST_DAYS,
    },
};

/// A forecast together with the place it was resolved from, if any.
#[derive(Debug, Clone)]
pub struct LocatedForecast {
    pub place: Option<GeocodedPlace>,
    pub series: ForecastSeries,
}

#[derive(Debug, Clone)]
pub struct Advice {
    pub kind: AdvisoryKind,
    pub place: Option<GeocodedPlace>,
    pub forecast: ForecastSeries,
    pub text: String,
}

/// Runs one request cycle: locate, fetch the forecast, then ask for advice.
#[derive(Debug)]
pub struct Advisor {
    geocoder: Box<dyn GeocodingClient>,
    forecast: Box<dyn ForecastClient>,
    days: u8,
    metrics: BTreeSet<Metric>,
}

impl Advisor {
    pub fn new(geocoder: Box<dyn GeocodingClient>, forecast: Box<dyn ForecastClient>) -> Self {
        Self {
            geocoder,
            forecast,
            days: default_forecast_days(),
            metrics: Metric::all().iter().copied().collect(),
        }
    }

    /// Open-Meteo clients configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self, AgroError> {
        let geocoder = OpenMeteoGeocoder::new(&config.weather, config.retry)?;
        let forecast = OpenMeteoForecast::new(&config.weather, config.retry)?;

        Self::new(Box::new(geocoder), Box::new(forecast)).with_days(config.weather.forecast_days)
    }

    pub fn with_days(mut self, days: u8) -> Result<Self, AgroError> {
        if !(1..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(AgroError::InvalidInput(format!(
                "forecast days must be between 1 and {MAX_FORECAST_DAYS}, got {days}"
            )));
        }
        self.days = days;
        Ok(self)
    }

    pub fn with_metrics(mut self, metrics: BTreeSet<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn days(&self) -> u8 {
        self.days
    }

    async fn locate(
        &self,
        location: &Location,
    ) -> Result<(Option<GeocodedPlace>, Coordinates), AgroError> {
        match location {
            Location::Coordinates(coords) => Ok((None, *coords)),
            Location::Place(name) => {
                let place = self.geocoder.lookup(name).await?;
                let coords = place.coordinates;
                Ok((Some(place), coords))
            }
        }
    }

    /// Resolve the location (if needed) and fetch the normalized forecast.
    #[instrument(skip(self))]
    pub async fn forecast(&self, location: &Location) -> Result<LocatedForecast, AgroError> {
        let (place, coords) = self.locate(location).await?;
        let series = self.forecast.get_forecast(coords, self.days, &self.metrics).await?;
        Ok(LocatedForecast { place, series })
    }

    /// Full cycle. `composer` is only called once a forecast is in hand.
    #[instrument(skip(self, composer, request))]
    pub async fn advise(
        &self,
        composer: &AdvisoryComposer,
        kind: AdvisoryKind,
        location: &Location,
        request: &AdvisoryRequest,
    ) -> Result<Advice, AgroError> {
        let LocatedForecast { place, series } = self.forecast(location).await?;
        let text = composer.compose(kind, request, &series).await?;

        info!(%kind, "Advisory complete");
        Ok(Advice {
            kind,
            place,
            forecast: series,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::GenerationBackend, model::DailyForecastEntry};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    #[derive(Debug)]
    struct FixedGeocoder;

    #[async_trait]
    impl GeocodingClient for FixedGeocoder {
        async fn lookup(&self, place_name: &str) -> Result<GeocodedPlace, AgroError> {
            if place_name == "Ludhiana" {
                Ok(GeocodedPlace {
                    name: "Ludhiana".into(),
                    country: Some("India".into()),
                    timezone: None,
                    coordinates: Coordinates::new(30.9, 75.85)?,
                })
            } else {
                Err(AgroError::NotFound(place_name.into()))
            }
        }
    }

    #[derive(Debug)]
    struct StubForecast {
        fail: bool,
    }

    #[async_trait]
    impl ForecastClient for StubForecast {
        async fn get_forecast(
            &self,
            coords: Coordinates,
            days: u8,
            _fields: &BTreeSet<Metric>,
        ) -> Result<ForecastSeries, AgroError> {
            if self.fail {
                return Err(AgroError::Transport("forecast: request timed out".into()));
            }
            let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
            let days = (0..u64::from(days))
                .map(|i| DailyForecastEntry {
                    date: start + chrono::Days::new(i),
                    temperature_min: 20.0,
                    temperature_max: 30.0,
                    precipitation_mm: 1.0,
                    humidity_percent: None,
                    weather_code: None,
                    storm: false,
                })
                .collect();
            Ok(ForecastSeries {
                coordinates: coords,
                timezone: None,
                current: None,
                days,
            })
        }
    }

    #[derive(Debug, Default)]
    struct CountingBackend {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GenerationBackend for CountingBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, AgroError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Sow maize this week.".into())
        }
    }

    fn advisor(fail_forecast: bool) -> Advisor {
        Advisor::new(Box::new(FixedGeocoder), Box::new(StubForecast { fail: fail_forecast }))
    }

    fn composer(calls: Arc<AtomicUsize>) -> AdvisoryComposer {
        AdvisoryComposer::new(Box::new(CountingBackend { calls }), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn advise_runs_full_cycle_for_place() {
        let calls = Arc::new(AtomicUsize::new(0));
        let advisor = advisor(false).with_days(3).unwrap();

        let advice = advisor
            .advise(
                &composer(calls.clone()),
                AdvisoryKind::CropRecommendation,
                &Location::Place("Ludhiana".into()),
                &AdvisoryRequest::default(),
            )
            .await
            .unwrap();

        assert_eq!(advice.text, "Sow maize this week.");
        assert_eq!(advice.forecast.len(), 3);
        assert_eq!(advice.place.unwrap().label(), "Ludhiana, India");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forecast_failure_never_reaches_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let advisor = advisor(true);

        let err = advisor
            .advise(
                &composer(calls.clone()),
                AdvisoryKind::IrrigationAdvice,
                &Location::Coordinates(Coordinates::new(28.6, 77.2).unwrap()),
                &AdvisoryRequest::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgroError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_place_never_reaches_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let advisor = advisor(false);

        let err = advisor
            .advise(
                &composer(calls.clone()),
                AdvisoryKind::CropRecommendation,
                &Location::Place("NoSuchPlaceXYZ123".into()),
                &AdvisoryRequest::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgroError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coordinates_skip_geocoding() {
        let advisor = advisor(false);
        let located = advisor
            .forecast(&Location::Coordinates(Coordinates::new(-33.9, 18.4).unwrap()))
            .await
            .unwrap();

        assert!(located.place.is_none());
        assert_eq!(located.series.len(), 7);
    }

    #[test]
    fn new_uses_configured_default_days() {
        assert_eq!(advisor(false).days(), Config::default().weather.forecast_days);
    }

    #[test]
    fn with_days_rejects_out_of_range() {
        assert!(advisor(false).with_days(0).is_err());
        assert!(advisor(false).with_days(17).is_err());
        assert_eq!(advisor(false).with_days(16).unwrap().days(), 16);
    }
}
