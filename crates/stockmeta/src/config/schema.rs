use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generation::{GenerationContext, Service};
use crate::secrets;

/// Smallest and largest accepted chunk sizes.
pub const MIN_CHUNK_SIZE: usize = 1;
pub const MAX_CHUNK_SIZE: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Database location; defaults to `~/.stockmeta/data/stockmeta.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    /// Custom prompt sent instead of the provider default.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Upper bound on stored tags per asset.
    #[serde(default)]
    pub max_tags: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Files generated concurrently per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Runs over more files than this in `all` mode need confirmation.
    #[serde(default = "default_large_batch_threshold")]
    pub large_batch_threshold: usize,
    /// Token cost assumed per file when estimating a large run.
    #[serde(default = "default_tokens_per_file")]
    pub tokens_per_file_estimate: u64,
    /// How often the chunk wait loop checks for outcomes and cancellation.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long in-flight calls may drain after a stop request.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_chunk_size() -> usize {
    5
}

fn default_large_batch_threshold() -> usize {
    1000
}

fn default_tokens_per_file() -> u64 {
    3000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_stop_grace_ms() -> u64 {
    500
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            large_batch_threshold: default_large_batch_threshold(),
            tokens_per_file_estimate: default_tokens_per_file(),
            poll_interval_ms: default_poll_interval_ms(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl BatchConfig {
    /// Chunk size clamped into the accepted range.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub gemini: Option<ServiceConfig>,
    #[serde(default)]
    pub openai: Option<ServiceConfig>,
}

impl ServicesConfig {
    pub fn get(&self, service: Service) -> Option<&ServiceConfig> {
        match service {
            Service::Gemini => self.gemini.as_ref(),
            Service::OpenAi => self.openai.as_ref(),
        }
    }
}

/// Models and credential sources of one AI service.
///
/// The credential is resolved from `api_key`, then `api_key_file`, then
/// `api_key_env`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Config {
    /// Builds the generation context for a service, validating the model
    /// and resolving the credential.
    pub fn resolve_context(
        &self,
        service: Service,
        model: Option<&str>,
    ) -> Result<GenerationContext, ConfigError> {
        let service_config = self
            .services
            .get(service)
            .ok_or_else(|| ConfigError::UnknownService(service.to_string()))?;

        let model = model
            .map(str::to_string)
            .or_else(|| service_config.default_model.clone())
            .or_else(|| service_config.models.first().cloned())
            .ok_or_else(|| ConfigError::UnknownModel {
                service: service.to_string(),
                model: String::new(),
            })?;

        if !service_config.models.is_empty() && !service_config.models.contains(&model) {
            return Err(ConfigError::UnknownModel {
                service: service.to_string(),
                model,
            });
        }

        let credential = secrets::resolve_secret(
            service_config.api_key.as_deref(),
            service_config.api_key_file.as_deref(),
            service_config.api_key_env.as_deref(),
        )
        .map_err(|e| ConfigError::MissingCredential {
            service: service.to_string(),
            reason: e.to_string(),
        })?;

        Ok(GenerationContext {
            service,
            model,
            credential,
            prompt: self.prompt.clone().filter(|p| !p.trim().is_empty()),
        })
    }

    /// Database path from config, falling back to the default location.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_deref()
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}
