use agro_core::{
    AdvisoryComposer, AdvisoryKind, AdvisoryRequest, Advisor, BackendId, Config,
    GenerationBackend, Location,
    backend::{backend_from_config, default_backend_from_config, ollama},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Password, Text};
use tracing::debug;

use crate::{output, prompts};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "agro", version, about = "Weather-aware crop and irrigation advice")]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Where to fetch the forecast for. Anything omitted is asked interactively.
#[derive(Debug, Clone, Args)]
pub struct LocationArgs {
    /// Place name to geocode, e.g. "Ludhiana".
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    pub place: Option<String>,

    /// Latitude in degrees (-90..90).
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees (-180..180).
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Forecast length in days (1-16); defaults to the configured value.
    #[arg(long)]
    pub days: Option<u8>,
}

#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Generation backend to use instead of the configured default ("gemini" or "ollama").
    #[arg(long)]
    pub backend: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials and model for a generation backend.
    Configure {
        /// Backend short name, e.g. "gemini" or "ollama".
        backend: String,
    },

    /// Show the daily forecast for a location.
    Forecast {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Ask for an irrigation schedule for a crop.
    Irrigate {
        #[command(flatten)]
        location: LocationArgs,

        #[command(flatten)]
        backend: BackendArgs,

        /// Crop name, e.g. "Rice".
        #[arg(long)]
        crop: Option<String>,

        /// Farm size in hectares.
        #[arg(long)]
        farm_size: Option<f64>,

        /// Soil type, e.g. "Sandy Loam".
        #[arg(long)]
        soil_type: Option<String>,

        /// Crop growth stage, e.g. "Flowering".
        #[arg(long)]
        growth_stage: Option<String>,

        /// Current soil moisture, % of field capacity.
        #[arg(long)]
        soil_moisture: Option<u8>,
    },

    /// Ask which crops suit the soil and upcoming weather.
    Recommend {
        #[command(flatten)]
        location: LocationArgs,

        #[command(flatten)]
        backend: BackendArgs,

        /// Nitrogen level, kg/ha.
        #[arg(long)]
        nitrogen: Option<f64>,

        /// Phosphorus level, kg/ha.
        #[arg(long)]
        phosphorus: Option<f64>,

        /// Potassium level, kg/ha.
        #[arg(long)]
        potassium: Option<f64>,

        /// Soil pH (0-14).
        #[arg(long)]
        ph: Option<f64>,

        /// Observed rainfall, mm.
        #[arg(long)]
        rainfall: Option<f64>,

        /// Soil type, e.g. "Black".
        #[arg(long)]
        soil_type: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure { backend } => configure(&mut config, &backend),
            Command::Forecast { location } => {
                let target = prompts::location(&location)?;
                let advisor = advisor(&config, &location)?;

                let located = advisor.forecast(&target).await?;
                output::print_forecast(&located);
                Ok(())
            }
            Command::Irrigate {
                location,
                backend,
                crop,
                farm_size,
                soil_type,
                growth_stage,
                soil_moisture,
            } => {
                let generator = generation_backend(&config, backend.backend.as_deref())?;
                let target = prompts::location(&location)?;
                let request = AdvisoryRequest {
                    crop: Some(prompts::crop(crop)?),
                    farm_size_ha: Some(prompts::farm_size(farm_size)?),
                    soil_type: Some(prompts::soil_type(soil_type)?),
                    growth_stage: Some(prompts::growth_stage(growth_stage)?),
                    soil_moisture_pct: Some(prompts::soil_moisture(soil_moisture)?),
                    ..Default::default()
                };

                advise(
                    &config,
                    &location,
                    generator,
                    AdvisoryKind::IrrigationAdvice,
                    &target,
                    &request,
                )
                .await
            }
            Command::Recommend {
                location,
                backend,
                nitrogen,
                phosphorus,
                potassium,
                ph,
                rainfall,
                soil_type,
            } => {
                let generator = generation_backend(&config, backend.backend.as_deref())?;
                let target = prompts::location(&location)?;
                let request = AdvisoryRequest {
                    nitrogen: Some(prompts::nutrient("Nitrogen (N)", nitrogen)?),
                    phosphorus: Some(prompts::nutrient("Phosphorus (P)", phosphorus)?),
                    potassium: Some(prompts::nutrient("Potassium (K)", potassium)?),
                    ph: Some(prompts::ph(ph)?),
                    rainfall_mm: Some(prompts::rainfall(rainfall)?),
                    soil_type: Some(prompts::soil_type(soil_type)?),
                    ..Default::default()
                };

                advise(
                    &config,
                    &location,
                    generator,
                    AdvisoryKind::CropRecommendation,
                    &target,
                    &request,
                )
                .await
            }
        }
    }
}

async fn advise(
    config: &Config,
    location: &LocationArgs,
    generator: Box<dyn GenerationBackend>,
    kind: AdvisoryKind,
    target: &Location,
    request: &AdvisoryRequest,
) -> Result<()> {
    let advisor = advisor(config, location)?;
    let composer = AdvisoryComposer::from_config(config, generator);

    println!("Fetching forecast and asking for {kind}...");
    let advice = advisor.advise(&composer, kind, target, request).await?;
    output::print_advice(&advice);
    Ok(())
}

fn advisor(config: &Config, location: &LocationArgs) -> Result<Advisor> {
    let advisor = Advisor::from_config(config)?;
    match location.days {
        Some(days) => Ok(advisor.with_days(days)?),
        None => Ok(advisor),
    }
}

/// The backend named on the command line, else the configured default, else
/// Gemini when a key is available from the environment.
fn generation_backend(config: &Config, flag: Option<&str>) -> Result<Box<dyn GenerationBackend>> {
    let generator = match flag {
        Some(name) => backend_from_config(BackendId::try_from(name)?, config)?,
        None if config.default_backend.is_none()
            && config.is_backend_configured(BackendId::Gemini) =>
        {
            backend_from_config(BackendId::Gemini, config)?
        }
        None => default_backend_from_config(config)?,
    };
    debug!(?generator, "Using generation backend");
    Ok(generator)
}

fn configure(config: &mut Config, backend: &str) -> Result<()> {
    let id = BackendId::try_from(backend)?;
    let current = config.backend_config(id).cloned().unwrap_or_default();

    if id.requires_api_key() {
        let api_key = Password::new(&format!("{id} API key:"))
            .without_confirmation()
            .with_help_message("Stored in the agro config file; GEMINI_API_KEY overrides it")
            .prompt()
            .context("Failed to read API key")?;
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!("API key must not be empty");
        }
        config.upsert_backend_api_key(id, api_key);
    } else {
        let base_url = Text::new("Server URL:")
            .with_default(current.base_url.as_deref().unwrap_or(ollama::DEFAULT_BASE_URL))
            .prompt()
            .context("Failed to read server URL")?;
        config.set_backend_base_url(id, base_url.trim().to_string());
    }

    let model = Text::new("Model:")
        .with_default(current.model.as_deref().unwrap_or(id.default_model()))
        .prompt()
        .context("Failed to read model name")?;
    config.set_backend_model(id, model.trim().to_string());

    let is_default = config.default_backend.as_deref() == Some(id.as_str());
    if !is_default {
        let make_default = config.default_backend.is_none()
            || Confirm::new(&format!("Make {id} the default backend?"))
                .with_default(true)
                .prompt()
                .context("Failed to read confirmation")?;
        if make_default {
            config.set_default_backend(id);
        }
    }

    config.save()?;
    println!(
        "Saved {id} settings to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}
