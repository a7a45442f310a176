//! Open-Meteo geocoding and forecast clients.
//!
//! Both endpoints are free and keyless. Each call is a single GET with a fixed
//! timeout, wrapped in the configured [`RetryPolicy`](crate::retry::RetryPolicy)
//! so that only transport failures are retried.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::{AgroError, truncate_body};

pub mod forecast;
pub mod geocoding;

pub use forecast::{DailyColumns, ForecastClient, OpenMeteoForecast, is_storm, transpose_daily};
pub use geocoding::{GeocodingClient, OpenMeteoGeocoder};

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, AgroError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgroError::Transport(format!("Failed to build HTTP client: {e}")))
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Send a prepared GET and decode its JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
) -> Result<T, AgroError> {
    let res = request
        .send()
        .await
        .map_err(|e| AgroError::from_weather_http(&format!("Failed to send {what} request"), e))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| AgroError::from_weather_http(&format!("Failed to read {what} body"), e))?;

    debug!(%status, bytes = body.len(), "{what} response received");

    if !status.is_success() {
        return Err(AgroError::Transport(format!(
            "{what} request failed with status {status}: {}",
            truncate_body(&body)
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| AgroError::MalformedResponse(format!("Failed to parse {what} JSON: {e}")))
}
