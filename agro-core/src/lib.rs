//! Core library for the `agro` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Open-Meteo geocoding and forecast clients, with day-major normalization
//! - Abstraction over text-generation backends
//! - Prompt rendering and the advisory request cycle
//!
//! It is used by `agro-cli`, but can also be reused by other binaries or services.

pub mod advisor;
pub mod advisory;
pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod retry;
pub mod weather;

pub use advisor::{Advice, Advisor, LocatedForecast};
pub use advisory::{AdvisoryComposer, forecast_table, render_prompt};
pub use backend::{BackendId, GenerationBackend};
pub use config::{BackendConfig, Config, WeatherSettings};
pub use error::AgroError;
pub use model::{
    AdvisoryKind, AdvisoryRequest, Coordinates, CurrentConditions, DailyForecastEntry,
    ForecastSeries, GeocodedPlace, Location, Metric, WeatherCondition,
};
pub use retry::RetryPolicy;
pub use weather::{ForecastClient, GeocodingClient, OpenMeteoForecast, OpenMeteoGeocoder};
