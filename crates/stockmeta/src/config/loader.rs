use std::path::{Path, PathBuf};

use crate::config::schema::{Config, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Returns the canonical config path: `~/.stockmeta/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".stockmeta").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = load_config_from_str(&content)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let chunk_size = config.batch.chunk_size;
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        return Err(ConfigError::Validation {
            message: format!(
                "batch.chunk_size must be between {} and {}, got {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE, chunk_size
            ),
        });
    }

    if config.batch.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "batch.poll_interval_ms must be greater than 0".to_string(),
        });
    }

    for (name, service) in [
        ("gemini", config.services.gemini.as_ref()),
        ("openai", config.services.openai.as_ref()),
    ] {
        let Some(service) = service else { continue };
        if let Some(default_model) = &service.default_model {
            if !service.models.is_empty() && !service.models.contains(default_model) {
                return Err(ConfigError::UnknownModel {
                    service: name.to_string(),
                    model: default_model.clone(),
                });
            }
        }
    }

    Ok(())
}
