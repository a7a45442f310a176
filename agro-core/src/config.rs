use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::{backend::BackendId, retry::RetryPolicy};

/// Environment variable that overrides the stored Gemini credential.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Settings for a single generation backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Geocoding and forecast endpoints plus forecast defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSettings {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// HTTP timeout for each geocoding/forecast request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Days requested when the caller does not say (1-16).
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Daily precipitation strictly above this marks the day as a storm.
    #[serde(default = "default_storm_threshold")]
    pub storm_threshold_mm: f64,
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

pub(crate) const fn default_forecast_days() -> u8 {
    7
}

const fn default_storm_threshold() -> f64 {
    20.0
}

const fn default_advice_timeout_secs() -> u64 {
    60
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timeout_secs: default_timeout_secs(),
            forecast_days: default_forecast_days(),
            storm_threshold_mm: default_storm_threshold(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Optional default backend id, e.g. "gemini" or "ollama".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,

    /// Example TOML:
    /// [backends.gemini]
    /// api_key = "..."
    /// model = "gemini-2.0-flash"
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,

    #[serde(default)]
    pub weather: WeatherSettings,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Upper bound on a single generation call.
    #[serde(default = "default_advice_timeout_secs")]
    pub advice_timeout_secs: u64,

    /// Gemini key taken from the environment; never written back to disk.
    #[serde(skip)]
    env_gemini_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_backend: None,
            backends: HashMap::new(),
            weather: WeatherSettings::default(),
            retry: RetryPolicy::default(),
            advice_timeout_secs: default_advice_timeout_secs(),
            env_gemini_api_key: None,
        }
    }
}

impl Config {
    /// Return the default backend as a strongly-typed BackendId.
    pub fn default_backend_id(&self) -> Result<BackendId> {
        let s = self.default_backend.as_ref().ok_or_else(|| {
            anyhow!(
                "No default backend configured.\n\
                 Hint: run `agro configure <backend>` (e.g. `agro configure gemini`) first."
            )
        })?;

        BackendId::try_from(s.as_str())
    }

    pub fn backend_config(&self, id: BackendId) -> Option<&BackendConfig> {
        self.backends.get(id.as_str())
    }

    pub fn set_default_backend(&mut self, id: BackendId) {
        self.default_backend = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = self.to_toml_string()?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "agro", "agro-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Take credentials from the environment, if set. They shadow the stored
    /// ones for this process only and are never serialized.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.env_gemini_api_key = lookup(GEMINI_API_KEY_ENV)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
    }

    /// Set/replace a backend API key and set the default backend if none is set.
    pub fn upsert_backend_api_key(&mut self, id: BackendId, api_key: String) {
        self.backends.entry(id.as_str().to_string()).or_default().api_key = Some(api_key);

        if self.default_backend.is_none() {
            self.default_backend = Some(id.to_string());
        }
    }

    pub fn set_backend_model(&mut self, id: BackendId, model: String) {
        self.backends.entry(id.as_str().to_string()).or_default().model = Some(model);
    }

    pub fn set_backend_base_url(&mut self, id: BackendId, base_url: String) {
        self.backends.entry(id.as_str().to_string()).or_default().base_url = Some(base_url);
    }

    /// Returns API key for a backend, if present. The environment wins over the file.
    pub fn backend_api_key(&self, id: BackendId) -> Option<&str> {
        let from_env = match id {
            BackendId::Gemini => self.env_gemini_api_key.as_deref(),
            BackendId::Ollama => None,
        };
        from_env.or_else(|| self.backend_config(id).and_then(|cfg| cfg.api_key.as_deref()))
    }

    pub fn is_backend_configured(&self, id: BackendId) -> bool {
        !id.requires_api_key() || self.backend_api_key(id).is_some()
    }

    fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.weather.forecast_days) {
            return Err(anyhow!(
                "weather.forecast_days must be between 1 and 16, got {}",
                self.weather.forecast_days
            ));
        }
        if self.weather.timeout_secs == 0 {
            return Err(anyhow!("weather.timeout_secs must be greater than zero"));
        }
        if self.advice_timeout_secs == 0 {
            return Err(anyhow!("advice_timeout_secs must be greater than zero"));
        }
        if !self.weather.storm_threshold_mm.is_finite() || self.weather.storm_threshold_mm < 0.0 {
            return Err(anyhow!("weather.storm_threshold_mm must be a non-negative number"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_backend_id().unwrap_err();

        assert!(err.to_string().contains("No default backend configured"));
    }

    #[test]
    fn defaults_match_observed_behaviour() {
        let cfg = Config::default();
        assert_eq!(cfg.weather.timeout_secs, 10);
        assert_eq!(cfg.weather.forecast_days, 7);
        assert_eq!(cfg.weather.storm_threshold_mm, 20.0);
        assert_eq!(cfg.advice_timeout_secs, 60);
        assert_eq!(cfg.retry.max_retries, 2);
    }

    #[test]
    fn set_api_key_and_default_for_backend() {
        let mut cfg = Config::default();

        cfg.upsert_backend_api_key(BackendId::Gemini, "GEMINI_KEY".into());

        let default = cfg.default_backend_id().expect("default backend must exist");
        assert_eq!(default, BackendId::Gemini);
        assert_eq!(cfg.backend_api_key(BackendId::Gemini), Some("GEMINI_KEY"));
        assert!(cfg.is_backend_configured(BackendId::Gemini));
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.set_default_backend(BackendId::Ollama);
        cfg.upsert_backend_api_key(BackendId::Gemini, "GEMINI_KEY".into());

        let default = cfg.default_backend_id().expect("default backend must exist");
        assert_eq!(default, BackendId::Ollama);
    }

    #[test]
    fn ollama_needs_no_credential() {
        let cfg = Config::default();
        assert!(cfg.is_backend_configured(BackendId::Ollama));
        assert!(!cfg.is_backend_configured(BackendId::Gemini));
    }

    #[test]
    fn env_override_replaces_stored_key() {
        let mut cfg = Config::default();
        cfg.upsert_backend_api_key(BackendId::Gemini, "FILE_KEY".into());

        cfg.apply_env_overrides(|name| {
            (name == GEMINI_API_KEY_ENV).then(|| " ENV_KEY ".to_string())
        });

        assert_eq!(cfg.backend_api_key(BackendId::Gemini), Some("ENV_KEY"));
    }

    #[test]
    fn env_key_is_never_serialized() {
        let mut cfg = Config::default();
        cfg.set_backend_model(BackendId::Ollama, "llama3.2".into());

        cfg.apply_env_overrides(|name| {
            (name == GEMINI_API_KEY_ENV).then(|| "ENV_SECRET".to_string())
        });
        assert_eq!(cfg.backend_api_key(BackendId::Gemini), Some("ENV_SECRET"));

        let text = cfg.to_toml_string().expect("serialize");
        assert!(!text.contains("ENV_SECRET"), "leaked into:\n{text}");
    }

    #[test]
    fn env_key_leaves_stored_key_in_file() {
        let mut cfg = Config::default();
        cfg.upsert_backend_api_key(BackendId::Gemini, "FILE_KEY".into());
        cfg.apply_env_overrides(|_| Some("ENV_SECRET".to_string()));

        let text = cfg.to_toml_string().expect("serialize");
        let parsed = Config::from_toml_str(&text).expect("parse");
        assert_eq!(parsed.backend_api_key(BackendId::Gemini), Some("FILE_KEY"));
    }

    #[test]
    fn zero_advice_timeout_is_rejected() {
        let err = Config::from_toml_str("advice_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("advice_timeout_secs"));
    }

    #[test]
    fn blank_env_value_is_ignored() {
        let mut cfg = Config::default();
        cfg.upsert_backend_api_key(BackendId::Gemini, "FILE_KEY".into());

        cfg.apply_env_overrides(|_| Some("   ".to_string()));

        assert_eq!(cfg.backend_api_key(BackendId::Gemini), Some("FILE_KEY"));
    }

    #[test]
    fn toml_roundtrip_preserves_settings() {
        let mut cfg = Config::default();
        cfg.upsert_backend_api_key(BackendId::Gemini, "KEY".into());
        cfg.set_backend_model(BackendId::Gemini, "gemini-1.5-pro".into());
        cfg.weather.storm_threshold_mm = 35.0;

        let text = cfg.to_toml_string().expect("serialize");
        let parsed = Config::from_toml_str(&text).expect("parse");

        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            default_backend = "ollama"

            [weather]
            storm_threshold_mm = 12.5
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.default_backend_id().unwrap(), BackendId::Ollama);
        assert_eq!(cfg.weather.storm_threshold_mm, 12.5);
        assert_eq!(cfg.weather.timeout_secs, 10);
        assert_eq!(cfg.weather.forecast_url, "https://api.open-meteo.com/v1");
    }

    #[test]
    fn out_of_range_forecast_days_are_rejected() {
        let err = Config::from_toml_str("[weather]\nforecast_days = 30\n").unwrap_err();
        assert!(err.to_string().contains("forecast_days"));
    }
}
