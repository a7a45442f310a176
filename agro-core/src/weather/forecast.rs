use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::{BTreeSet, HashMap},
    fmt::Debug,
};
use tracing::{info, instrument};

use crate::{
    config::WeatherSettings,
    error::AgroError,
    model::{Coordinates, CurrentConditions, DailyForecastEntry, ForecastSeries, Metric},
    retry::RetryPolicy,
};

use super::{get_json, http_client, trim_base_url};

/// Largest day count the provider accepts.
pub const MAX_FORECAST_DAYS: u8 = 16;

#[async_trait]
pub trait ForecastClient: Send + Sync + Debug {
    async fn get_forecast(
        &self,
        coords: Coordinates,
        days: u8,
        fields: &BTreeSet<Metric>,
    ) -> Result<ForecastSeries, AgroError>;
}

/// Storm rule: strictly more precipitation than the threshold.
pub fn is_storm(precipitation_mm: f64, threshold_mm: f64) -> bool {
    precipitation_mm > threshold_mm
}

/// The provider's `daily` object: a `time` array plus one array per metric.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyColumns {
    #[serde(default)]
    pub time: Option<Vec<String>>,
    #[serde(flatten)]
    pub columns: HashMap<String, Value>,
}

impl DailyColumns {
    /// `None` when the provider left the column out, otherwise exactly `days` cells.
    fn column(&self, name: &str, days: usize) -> Result<Option<Vec<Option<f64>>>, AgroError> {
        let Some(raw) = self.columns.get(name) else {
            return Ok(None);
        };

        let cells = raw.as_array().ok_or_else(|| {
            AgroError::MalformedResponse(format!("daily.{name} is not an array"))
        })?;

        if cells.len() != days {
            return Err(AgroError::MalformedResponse(format!(
                "daily.{name} has {} values, expected {days}",
                cells.len()
            )));
        }

        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Value::Null => Ok(None),
                other => other.as_f64().map(Some).ok_or_else(|| {
                    AgroError::MalformedResponse(format!("daily.{name}[{i}] is not a number"))
                }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn required_column(&self, metric: Metric, days: usize) -> Result<Vec<f64>, AgroError> {
        let name = metric.daily_field().unwrap_or_default();
        let cells = self
            .column(name, days)?
            .ok_or_else(|| AgroError::MalformedResponse(format!("daily.{name} is missing")))?;

        cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                cell.ok_or_else(|| {
                    AgroError::MalformedResponse(format!("daily.{name}[{i}] is null"))
                })
            })
            .collect()
    }

    fn optional_column(
        &self,
        metric: Metric,
        fields: &BTreeSet<Metric>,
        days: usize,
    ) -> Result<Vec<Option<f64>>, AgroError> {
        let column = match metric.daily_field() {
            Some(name) if fields.contains(&metric) => self.column(name, days)?,
            _ => None,
        };
        Ok(column.unwrap_or_else(|| vec![None; days]))
    }
}

/// Turn field-major daily arrays into one record per day.
///
/// Minimum/maximum temperature and precipitation are always required. Humidity
/// and weather code are filled only when requested in `fields` and present in
/// the payload. Dates must be consecutive, and every array must hold exactly
/// `days` values.
pub fn transpose_daily(
    daily: &DailyColumns,
    fields: &BTreeSet<Metric>,
    days: usize,
    storm_threshold_mm: f64,
) -> Result<Vec<DailyForecastEntry>, AgroError> {
    let time = daily
        .time
        .as_ref()
        .ok_or_else(|| AgroError::MalformedResponse("daily.time is missing".into()))?;

    if time.len() != days {
        return Err(AgroError::MalformedResponse(format!(
            "daily.time has {} dates, expected {days}",
            time.len()
        )));
    }

    let dates = parse_dates(time)?;
    let t_min = daily.required_column(Metric::TempMin, days)?;
    let t_max = daily.required_column(Metric::TempMax, days)?;
    let precipitation = daily.required_column(Metric::Precipitation, days)?;
    let humidity = daily.optional_column(Metric::Humidity, fields, days)?;
    let codes = daily
        .optional_column(Metric::WeatherCode, fields, days)?
        .into_iter()
        .map(|cell| cell.map(wmo_code).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| DailyForecastEntry {
            date,
            temperature_min: t_min[i],
            temperature_max: t_max[i],
            precipitation_mm: precipitation[i],
            humidity_percent: humidity[i],
            weather_code: codes[i],
            storm: is_storm(precipitation[i], storm_threshold_mm),
        })
        .collect())
}

fn parse_dates(time: &[String]) -> Result<Vec<NaiveDate>, AgroError> {
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(time.len());
    for raw in time {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| AgroError::MalformedResponse(format!("invalid date '{raw}': {e}")))?;

        if let Some(prev) = dates.last() {
            if prev.succ_opt() != Some(date) {
                return Err(AgroError::MalformedResponse(format!(
                    "dates are not consecutive: {prev} followed by {date}"
                )));
            }
        }
        dates.push(date);
    }
    Ok(dates)
}

fn wmo_code(value: f64) -> Result<u8, AgroError> {
    if value.fract() == 0.0 && (0.0..=255.0).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AgroError::MalformedResponse(format!("invalid weather code {value}")))
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoForecast {
    base_url: String,
    http: Client,
    retry: RetryPolicy,
    storm_threshold_mm: f64,
}

impl OpenMeteoForecast {
    pub fn new(settings: &WeatherSettings, retry: RetryPolicy) -> Result<Self, AgroError> {
        Ok(Self {
            base_url: trim_base_url(&settings.forecast_url),
            http: http_client(settings.timeout_secs)?,
            retry,
            storm_threshold_mm: settings.storm_threshold_mm,
        })
    }

    async fn fetch_once(
        &self,
        coords: Coordinates,
        days: u8,
        fields: &BTreeSet<Metric>,
    ) -> Result<ForecastSeries, AgroError> {
        let mut query = vec![
            ("latitude", coords.latitude().to_string()),
            ("longitude", coords.longitude().to_string()),
            ("daily", daily_param(fields)),
            ("forecast_days", days.to_string()),
            ("timezone", "auto".to_string()),
        ];
        if fields.contains(&Metric::CurrentConditions) {
            query.push(("current_weather", "true".to_string()));
        }

        let request = self.http.get(format!("{}/forecast", self.base_url)).query(&query);
        let parsed: OmForecastResponse = get_json(request, "forecast").await?;

        let daily = parsed
            .daily
            .ok_or_else(|| AgroError::MalformedResponse("response has no daily block".into()))?;

        let entries = transpose_daily(&daily, fields, usize::from(days), self.storm_threshold_mm)?;

        let current = if fields.contains(&Metric::CurrentConditions) {
            let cw = parsed.current_weather.ok_or_else(|| {
                AgroError::MalformedResponse("response has no current_weather block".into())
            })?;
            Some(CurrentConditions {
                temperature_c: cw.temperature,
                wind_speed_kmh: cw.windspeed,
                weather_code: cw.weathercode.map(wmo_code).transpose()?,
            })
        } else {
            None
        };

        Ok(ForecastSeries {
            coordinates: coords,
            timezone: parsed.timezone,
            current,
            days: entries,
        })
    }
}

/// Comma-separated daily metric names; the required three are always asked for.
fn daily_param(fields: &BTreeSet<Metric>) -> String {
    Metric::required()
        .iter()
        .chain(fields.iter())
        .copied()
        .collect::<BTreeSet<_>>()
        .iter()
        .filter_map(Metric::daily_field)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    timezone: Option<String>,
    daily: Option<DailyColumns>,
    current_weather: Option<OmCurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: Option<f64>,
}

#[async_trait]
impl ForecastClient for OpenMeteoForecast {
    #[instrument(skip(self, metrics))]
    async fn get_forecast(
        &self,
        coords: Coordinates,
        days: u8,
        metrics: &BTreeSet<Metric>,
    ) -> Result<ForecastSeries, AgroError> {
        if !(1..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(AgroError::InvalidInput(format!(
                "forecast days must be between 1 and {MAX_FORECAST_DAYS}, got {days}"
            )));
        }

        let series = self
            .retry
            .run("forecast", || self.fetch_once(coords, days, metrics))
            .await?;

        info!(
            days = series.len(),
            storms = series.storm_days().count(),
            "Forecast normalized"
        );
        Ok(series)
    }
}
