// Tracing subscriber setup
//
// RUST_LOG wins when set. Otherwise the configured level is used for this
// crate, raised to debug by `-v`. Output goes to stderr, or appends to the
// configured log file without ANSI colors.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Directive used when RUST_LOG is unset
pub fn default_directive(settings: &LoggingSettings, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        settings.level.trim()
    };
    let level = if level.is_empty() { "info" } else { level };
    format!("warn,rolecast={}", level)
}

/// Install the global subscriber; call once from `main`
pub fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::try_new(default_directive(settings, verbose))
            .with_context(|| format!("Invalid log level '{}'", settings.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match &settings.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let settings = LoggingSettings {
            level: "warn".into(),
            file: None,
        };
        assert_eq!(default_directive(&settings, false), "warn,rolecast=warn");
        assert_eq!(default_directive(&settings, true), "warn,rolecast=debug");

        let blank = LoggingSettings {
            level: " ".into(),
            file: None,
        };
        assert_eq!(default_directive(&blank, false), "warn,rolecast=info");
    }
}
