// Provider selection and per-vendor settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported chat-completion vendors
///
/// Selected once at startup from config or `--provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Openai,
    Claude,
    Zhipu,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Openai, Self::Claude, Self::Zhipu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Claude => "claude",
            Self::Zhipu => "zhipu",
        }
    }

    /// Conventional vendor environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Openai => "OPENAI_API_KEY",
            Self::Claude => "ANTHROPIC_API_KEY",
            Self::Zhipu => "ZHIPU_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Openai => "https://api.openai.com",
            Self::Claude => "https://api.anthropic.com",
            Self::Zhipu => "https://open.bigmodel.cn",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Openai => "gpt-3.5-turbo",
            Self::Claude => "claude-3-sonnet-20240229",
            Self::Zhipu => "glm-4",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "claude" | "anthropic" => Ok(Self::Claude),
            "zhipu" | "glm" => Ok(Self::Zhipu),
            other => Err(format!(
                "unknown provider '{}' (expected one of: openai, claude, zhipu)",
                other
            )),
        }
    }
}

/// Credentials and endpoint overrides for one vendor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// API key if present and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// One settings block per vendor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderSettings,
    pub claude: ProviderSettings,
    pub zhipu: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Openai => &self.openai,
            ProviderKind::Claude => &self.claude,
            ProviderKind::Zhipu => &self.zhipu,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::Openai => &mut self.openai,
            ProviderKind::Claude => &mut self.claude,
            ProviderKind::Zhipu => &mut self.zhipu,
        }
    }
}
