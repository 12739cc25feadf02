// Configuration structures

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::constants::*;
use super::provider::{ProviderKind, ProviderSettings, ProvidersConfig};
use crate::storage::StorageFormat;

/// Application configuration
///
/// Built once by `load_config` and handed to every constructor that needs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Active vendor
    pub provider: ProviderKind,
    pub providers: ProvidersConfig,
    pub generation: GenerationSettings,
    pub retry: RetrySettings,
    pub storage: StorageSettings,
    pub dialogue: DialogueSettings,
    pub validation: ValidationSettings,
    pub analysis: AnalysisSettings,
    pub templates: TemplateSettings,
    pub logging: LoggingSettings,
}

/// Sampling defaults for persona replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bounded exponential backoff for retryable provider errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one; 1 disables retry
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub format: StorageFormat,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("./data"));
        Self {
            data_dir,
            format: StorageFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueSettings {
    /// Trailing messages sent to the provider; `None` sends the full history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub max_concurrency: usize,
    pub call_timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_VALIDATION_MAX_TOKENS,
        }
    }
}

impl ValidationSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_ANALYSIS_MAX_TOKENS,
            temperature: DEFAULT_ANALYSIS_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Directory of `<name>.j2` files overriding the built-ins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl AppConfig {
    /// Settings block of the active provider
    pub fn active_provider(&self) -> &ProviderSettings {
        self.providers.get(self.provider)
    }

    /// Model used for requests: configured override or the vendor default
    pub fn active_model(&self) -> String {
        self.active_provider()
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Apply command-line overrides on top of the loaded config
    pub fn with_overrides(mut self, provider: Option<ProviderKind>, model: Option<String>) -> Self {
        if let Some(kind) = provider {
            self.provider = kind;
        }
        if let Some(model) = model {
            self.providers.get_mut(self.provider).model = Some(model);
        }
        self
    }

    /// Effective configuration as TOML with API keys masked
    pub fn to_redacted_toml(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        for kind in ProviderKind::ALL {
            if let Some(key) = shown.providers.get_mut(kind).api_key.as_mut() {
                *key = redact(key);
            }
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!(
                "generation.temperature must be between 0.0 and 2.0 (got {})",
                self.generation.temperature
            );
        }
        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            bail!(
                "analysis.temperature must be between 0.0 and 2.0 (got {})",
                self.analysis.temperature
            );
        }
        if self.generation.max_tokens == 0
            || self.validation.max_tokens == 0
            || self.analysis.max_tokens == 0
        {
            bail!("max_tokens settings must be greater than zero");
        }
        if self.generation.timeout_secs == 0 || self.validation.call_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        if self.validation.max_concurrency == 0 {
            bail!("validation.max_concurrency must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.active_provider().api_key().is_none() {
            bail!(
                "No API key configured for provider '{}'.\n\n\
                 Set it in the config file:\n  \
                 [providers.{}]\n  api_key = \"...\"\n\n\
                 or export {}",
                self.provider,
                self.provider,
                self.provider.api_key_env()
            );
        }
        Ok(())
    }
}

fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
