//! Prompt rendering and the single call to the generation backend.
//!
//! The rendered prompt is deterministic for a given request and forecast. The
//! backend's answer is returned verbatim; nothing here interprets it.

use std::{fmt::Write as _, time::Duration};
use tracing::{info, instrument, warn};

use crate::{
    Config,
    backend::GenerationBackend,
    error::AgroError,
    model::{AdvisoryKind, AdvisoryRequest, ForecastSeries},
};

#[derive(Debug)]
pub struct AdvisoryComposer {
    backend: Box<dyn GenerationBackend>,
    timeout: Duration,
}

impl AdvisoryComposer {
    pub fn new(backend: Box<dyn GenerationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn from_config(config: &Config, backend: Box<dyn GenerationBackend>) -> Self {
        Self::new(backend, Duration::from_secs(config.advice_timeout_secs))
    }

    /// Render the prompt and return the backend's text unchanged.
    #[instrument(skip(self, request, forecast), fields(days = forecast.len()))]
    pub async fn compose(
        &self,
        kind: AdvisoryKind,
        request: &AdvisoryRequest,
        forecast: &ForecastSeries,
    ) -> Result<String, AgroError> {
        let prompt = render_prompt(kind, request, forecast);

        let text = tokio::time::timeout(self.timeout, self.backend.generate(&prompt))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "Generation backend timed out");
                AgroError::Backend(format!(
                    "generation backend did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        info!(chars = text.len(), "Advice received");
        Ok(text)
    }
}

/// Build the natural-language prompt for `kind`.
///
/// Every present request field is written exactly once, followed by the full
/// forecast as a markdown table.
pub fn render_prompt(
    kind: AdvisoryKind,
    request: &AdvisoryRequest,
    forecast: &ForecastSeries,
) -> String {
    let mut out = String::new();

    out.push_str(match kind {
        AdvisoryKind::CropRecommendation => {
            "Based on the following soil and weather data, recommend the **most suitable crops** \
             to grow on my farm right now and explain briefly why each one fits.\n\n"
        }
        AdvisoryKind::IrrigationAdvice => {
            "Based on the following data, calculate the **exact irrigation water needed** for my \
             crop in **cubic meters (m³) per day**, and provide a clear, practical **daily \
             irrigation schedule**:\n\n"
        }
    });

    for (label, value) in request.labelled_fields() {
        let _ = writeln!(out, "- **{label}**: {value}");
    }

    if let Some(current) = &forecast.current {
        let _ = writeln!(out, "- **Current weather conditions**: {}", current.summary());
    }
    if let Some(today) = forecast.first_day() {
        let _ = writeln!(
            out,
            "- **Effective rainfall (next 24h)**: {} mm",
            today.precipitation_mm
        );
        if let Some(humidity) = today.humidity_percent {
            let _ = writeln!(out, "- **Current relative humidity**: {humidity:.0}%");
        }
    }

    let _ = writeln!(out, "\n**{}-day weather forecast**:\n", forecast.len());
    out.push_str(&forecast_table(forecast));

    let storms: Vec<String> = forecast.storm_days().map(|d| d.date.to_string()).collect();
    if !storms.is_empty() {
        let _ = writeln!(out, "\nHeavy rain / storm expected on: {}", storms.join(", "));
    }

    out.push_str("\nProvide:\n");
    out.push_str(match kind {
        AdvisoryKind::CropRecommendation => {
            "1. The top 3 crops for these conditions, ranked.\n\
             2. The best sowing window within the forecast period.\n\
             3. Soil amendments needed for the given nutrient levels and pH.\n\
             4. Weather risks to watch for during establishment.\n"
        }
        AdvisoryKind::IrrigationAdvice => {
            "1. Water requirement in m³/day.\n\
             2. Ideal irrigation interval (daily, alternate days, etc.).\n\
             3. Adjustments based on rainfall or extreme weather.\n\
             4. Practical advice on efficient water use for the soil type.\n"
        }
    });
    out.push_str(
        "\nOnly give facts and practical recommendations in 2-3 lines. \
         Avoid vague recommendations, suggestions or disclaimers.\n",
    );

    out
}

/// Markdown table with one row per forecast day.
pub fn forecast_table(forecast: &ForecastSeries) -> String {
    let mut table = String::from(
        "| Date | Min Temp (°C) | Max Temp (°C) | Rainfall (mm) | Humidity (%) | Conditions | Storm |\n\
         |------|---------------|---------------|---------------|--------------|------------|-------|\n",
    );

    for day in &forecast.days {
        let humidity = day
            .humidity_percent
            .map(|h| format!("{h:.0}"))
            .unwrap_or_else(|| "-".to_string());
        let conditions = day
            .condition()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            table,
            "| {} | {} | {} | {} | {} | {} | {} |",
            day.date,
            day.temperature_min,
            day.temperature_max,
            day.precipitation_mm,
            humidity,
            conditions,
            if day.storm { "yes" } else { "no" },
        );
    }
    table
}
