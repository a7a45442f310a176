use crate::{
    Config,
    backend::{gemini::GeminiBackend, ollama::OllamaBackend},
    error::AgroError,
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug};

pub mod gemini;
pub mod ollama;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    Gemini,
    Ollama,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Gemini => "gemini",
            BackendId::Ollama => "ollama",
        }
    }

    pub const fn all() -> &'static [BackendId] {
        &[BackendId::Gemini, BackendId::Ollama]
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, BackendId::Gemini)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            BackendId::Gemini => gemini::DEFAULT_MODEL,
            BackendId::Ollama => ollama::DEFAULT_MODEL,
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BackendId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "gemini" => Ok(BackendId::Gemini),
            "ollama" => Ok(BackendId::Ollama),
            _ => Err(anyhow::anyhow!(
                "Unknown backend '{value}'. Supported backends: gemini, ollama."
            )),
        }
    }
}

/// A text-generation service: one prompt in, one free-text answer out.
#[async_trait]
pub trait GenerationBackend: Send + Sync + Debug {
    async fn generate(&self, prompt: &str) -> Result<String, AgroError>;
}

/// Construct a backend from config and explicit BackendId.
pub fn backend_from_config(
    id: BackendId,
    config: &Config,
) -> anyhow::Result<Box<dyn GenerationBackend>> {
    let settings = config.backend_config(id).cloned().unwrap_or_default();

    let boxed: Box<dyn GenerationBackend> = match id {
        BackendId::Gemini => {
            let api_key = config.backend_api_key(id).ok_or_else(|| {
                anyhow::anyhow!(
                    "No API key configured for backend '{id}'.\n\
                     Hint: run `agro configure {id}` or set GEMINI_API_KEY."
                )
            })?;
            let mut backend = GeminiBackend::new(api_key.to_string());
            if let Some(model) = settings.model {
                backend = backend.with_model(model);
            }
            if let Some(url) = settings.base_url {
                backend = backend.with_base_url(url);
            }
            Box::new(backend)
        }
        BackendId::Ollama => {
            let mut backend = OllamaBackend::new();
            if let Some(model) = settings.model {
                backend = backend.with_model(model);
            }
            if let Some(url) = settings.base_url {
                backend = backend.with_base_url(url);
            }
            Box::new(backend)
        }
    };

    Ok(boxed)
}

/// Construct the default backend from config, using `default_backend` field.
pub fn default_backend_from_config(config: &Config) -> anyhow::Result<Box<dyn GenerationBackend>> {
    let id = config.default_backend_id()?;
    backend_from_config(id, config)
}
