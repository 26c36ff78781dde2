//! Contract for the external metadata generation capability.
//!
//! Provider clients (Gemini, OpenAI) live outside this crate and plug in
//! through [`MetadataGenerator`]. The batch engine only relies on the
//! contract below.

pub mod category;
pub mod tags;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::batch::CancellationToken;
use crate::error::ConfigError;

pub use category::{CategoryAssignment, CategorySlot, StockPlatform};

/// AI service a generation request is sent to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Gemini,
    OpenAi,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Gemini => "gemini",
            Service::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Service::Gemini),
            "openai" => Ok(Service::OpenAi),
            other => Err(ConfigError::UnknownService(other.to_string())),
        }
    }
}

/// Everything a generator needs besides the file itself.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub service: Service,
    pub model: String,
    pub credential: SecretString,
    /// Custom prompt replacing the provider's default instructions.
    pub prompt: Option<String>,
}

/// Structured result of one generation attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub title: String,
    pub description: String,
    /// Comma-joined tag list.
    pub tags: String,
    #[serde(default)]
    pub categories: Vec<CategoryAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub token_input: u64,
    pub token_output: u64,
    pub token_total: u64,
}

impl GenerationOutput {
    /// Empty result returned when a call is short-circuited by cancellation.
    /// It carries no tokens and no error.
    pub fn cancelled() -> Self {
        Self::default()
    }

    /// Result for a provider-side failure (timeout, malformed response).
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// The metadata generation capability.
///
/// Implementations block for the duration of the provider call. Ordinary
/// failures must be reported through [`GenerationOutput::error`]; the batch
/// engine still isolates panics. Long calls should poll `cancel` and return
/// [`GenerationOutput::cancelled`] once it is set.
pub trait MetadataGenerator: Send + Sync {
    fn generate(
        &self,
        ctx: &GenerationContext,
        filepath: &Path,
        cancel: &CancellationToken,
    ) -> GenerationOutput;
}

impl<F> MetadataGenerator for F
where
    F: Fn(&GenerationContext, &Path, &CancellationToken) -> GenerationOutput + Send + Sync,
{
    fn generate(
        &self,
        ctx: &GenerationContext,
        filepath: &Path,
        cancel: &CancellationToken,
    ) -> GenerationOutput {
        self(ctx, filepath, cancel)
    }
}
