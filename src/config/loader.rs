// Configuration loader
// Merges defaults, the config file and environment variables into an AppConfig

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::{APP_DIR, CONFIG_PATH_ENV, ENV_PREFIX};
use super::provider::ProviderKind;
use super::settings::AppConfig;

static ENV_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
});

/// Resolve the config file path: `ROLECAST_CONFIG` or `<config_dir>/rolecast/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Load configuration using the process environment
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            load_config_from(Some(path), &env)
        }
        None => {
            let path = default_config_path().filter(|p| p.exists());
            load_config_from(path.as_deref(), &env)
        }
    }
}

/// Load configuration from an optional file and an explicit environment map
pub fn load_config_from(path: Option<&Path>, env: &HashMap<String, String>) -> Result<AppConfig> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let expanded = expand_env_vars(&contents, env);
        tracing::debug!("Loading config from {}", path.display());
        builder = builder.add_source(::config::File::from_str(&expanded, file_format(path)));
    }

    builder = builder.add_source(
        ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(env.clone())),
    );

    let mut config: AppConfig = builder
        .build()
        .context("Failed to merge configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    // Vendor key variables only fill keys that are still empty
    for kind in ProviderKind::ALL {
        let settings = config.providers.get_mut(kind);
        if settings.api_key().is_none() {
            if let Some(key) = env.get(kind.api_key_env()).filter(|k| !k.trim().is_empty()) {
                tracing::debug!("Using {} from environment", kind.api_key_env());
                settings.api_key = Some(key.clone());
            }
        }
    }

    Ok(config)
}

/// Expand `${VAR}` references; unknown variables expand to an empty string
pub fn expand_env_vars(input: &str, env: &HashMap<String, String>) -> String {
    ENV_REF
        .replace_all(input, |caps: &regex::Captures| {
            env.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn file_format(path: &Path) -> ::config::FileFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => ::config::FileFormat::Yaml,
        Some("json") => ::config::FileFormat::Json,
        _ => ::config::FileFormat::Toml,
    }
}
