use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AgroError;

/// A validated point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = AgroError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.latitude, raw.longitude)
    }
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AgroError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AgroError::InvalidInput(format!(
                "coordinates ({latitude}, {longitude}) out of range: \
                 latitude must be -90 to 90, longitude must be -180 to 180"
            )));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Best geocoding match for a place name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    pub name: String,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub coordinates: Coordinates,
}

impl GeocodedPlace {
    pub fn label(&self) -> String {
        match &self.country {
            Some(country) => format!("{}, {}", self.name, country),
            None => self.name.clone(),
        }
    }
}

/// Where the forecast should be fetched for.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Coordinates(Coordinates),
    Place(String),
}

/// A metric that can be requested from the forecast provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TempMax,
    TempMin,
    Precipitation,
    Humidity,
    WeatherCode,
    CurrentConditions,
}

impl Metric {
    /// Name of the daily array in the provider payload; `None` for non-daily metrics.
    pub fn daily_field(&self) -> Option<&'static str> {
        match self {
            Metric::TempMax => Some("temperature_2m_max"),
            Metric::TempMin => Some("temperature_2m_min"),
            Metric::Precipitation => Some("precipitation_sum"),
            Metric::Humidity => Some("relative_humidity_2m_mean"),
            Metric::WeatherCode => Some("weather_code"),
            Metric::CurrentConditions => None,
        }
    }

    pub const fn all() -> &'static [Metric] {
        &[
            Metric::TempMax,
            Metric::TempMin,
            Metric::Precipitation,
            Metric::Humidity,
            Metric::WeatherCode,
            Metric::CurrentConditions,
        ]
    }

    /// Metrics every forecast carries regardless of what was asked for.
    pub const fn required() -> &'static [Metric] {
        &[Metric::TempMax, Metric::TempMin, Metric::Precipitation]
    }
}

/// Coarse grouping of WMO weather interpretation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Showers,
    Thunderstorm,
    Unknown,
}

impl WeatherCondition {
    /// See <https://open-meteo.com/en/docs> for the WMO code table.
    pub const fn from_wmo_code(code: u8) -> Self {
        match code {
            0 | 1 => Self::Clear,
            2 | 3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51..=57 => Self::Drizzle,
            61..=67 => Self::Rain,
            71..=77 | 85 | 86 => Self::Snow,
            80..=82 => Self::Showers,
            95..=99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Cloudy => "cloudy",
            Self::Fog => "fog",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Showers => "rain showers",
            Self::Thunderstorm => "thunderstorm",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// One calendar day of the forecast with every requested metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecastEntry {
    pub date: NaiveDate,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub precipitation_mm: f64,
    pub humidity_percent: Option<f64>,
    pub weather_code: Option<u8>,
    /// Precipitation strictly above the configured storm threshold.
    pub storm: bool,
}

impl DailyForecastEntry {
    pub fn condition(&self) -> Option<WeatherCondition> {
        self.weather_code.map(WeatherCondition::from_wmo_code)
    }
}

/// Conditions at request time, reported alongside the daily series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    pub weather_code: Option<u8>,
}

impl CurrentConditions {
    pub fn summary(&self) -> String {
        let sky = self
            .weather_code
            .map(|code| format!(", {} (WMO {code})", WeatherCondition::from_wmo_code(code)))
            .unwrap_or_default();
        format!(
            "{:.1}°C, wind {:.1} km/h{sky}",
            self.temperature_c, self.wind_speed_kmh
        )
    }
}

/// Day-major forecast, ordered by ascending date with no gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub coordinates: Coordinates,
    pub timezone: Option<String>,
    pub current: Option<CurrentConditions>,
    pub days: Vec<DailyForecastEntry>,
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn first_day(&self) -> Option<&DailyForecastEntry> {
        self.days.first()
    }

    pub fn storm_days(&self) -> impl Iterator<Item = &DailyForecastEntry> {
        self.days.iter().filter(|d| d.storm)
    }

    pub fn total_precipitation_mm(&self) -> f64 {
        self.days.iter().map(|d| d.precipitation_mm).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvisoryKind {
    CropRecommendation,
    IrrigationAdvice,
}

impl AdvisoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisoryKind::CropRecommendation => "crop recommendation",
            AdvisoryKind::IrrigationAdvice => "irrigation advice",
        }
    }
}

impl std::fmt::Display for AdvisoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agronomic parameters supplied by the user. Ranges are the caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub crop: Option<String>,
    pub farm_size_ha: Option<f64>,
    pub soil_type: Option<String>,
    pub growth_stage: Option<String>,
    pub soil_moisture_pct: Option<u8>,
    pub nitrogen: Option<f64>,
    pub phosphorus: Option<f64>,
    pub potassium: Option<f64>,
    pub ph: Option<f64>,
    pub rainfall_mm: Option<f64>,
}

impl AdvisoryRequest {
    /// Present fields as `(label, rendered value)` pairs, in a stable order.
    pub fn labelled_fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(crop) = &self.crop {
            out.push(("Crop", crop.clone()));
        }
        if let Some(size) = self.farm_size_ha {
            out.push(("Farm size", format!("{size} hectares")));
        }
        if let Some(soil) = &self.soil_type {
            out.push(("Soil type", soil.clone()));
        }
        if let Some(stage) = &self.growth_stage {
            out.push(("Crop growth stage", stage.clone()));
        }
        if let Some(moisture) = self.soil_moisture_pct {
            out.push(("Current soil moisture", format!("{moisture}% of field capacity")));
        }
        if let Some(n) = self.nitrogen {
            out.push(("Nitrogen (N)", format!("{n} kg/ha")));
        }
        if let Some(p) = self.phosphorus {
            out.push(("Phosphorus (P)", format!("{p} kg/ha")));
        }
        if let Some(k) = self.potassium {
            out.push(("Potassium (K)", format!("{k} kg/ha")));
        }
        if let Some(ph) = self.ph {
            out.push(("Soil pH", ph.to_string()));
        }
        if let Some(rain) = self.rainfall_mm {
            out.push(("Observed rainfall", format!("{rain} mm")));
        }
        out
    }
}
