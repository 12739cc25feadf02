// Project-wide constants
//
// Centralised here so defaults have one source of truth.
// Import via `use crate::config::constants::*;`.

/// Prefix for environment overrides, e.g. `ROLECAST_PROVIDER=claude`.
pub const ENV_PREFIX: &str = "ROLECAST";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ROLECAST_CONFIG";

/// Application directory name under the platform config/data dirs.
pub const APP_DIR: &str = "rolecast";

/// Default generation budget for persona replies.
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Default sampling temperature for persona replies.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Per remote call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Validation fan-out width.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Validation replies are kept short.
pub const DEFAULT_VALIDATION_MAX_TOKENS: u32 = 1000;

/// Analysis runs cooler and longer than dialogue.
pub const DEFAULT_ANALYSIS_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_ANALYSIS_TEMPERATURE: f32 = 0.5;

/// Retry policy (exponential backoff: base * 2^attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
