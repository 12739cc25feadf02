// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;
mod provider;
mod settings;

pub use loader::{default_config_path, expand_env_vars, load_config, load_config_from};
pub use provider::{ProviderKind, ProviderSettings, ProvidersConfig};
pub use settings::{
    AnalysisSettings, AppConfig, DialogueSettings, GenerationSettings, LoggingSettings,
    RetrySettings, StorageSettings, TemplateSettings, ValidationSettings,
};
