// Provider factory
//
// Creates the configured LLM provider from an AppConfig

use std::sync::Arc;

use super::claude::ClaudeProvider;
use super::openai::OpenAIProvider;
use super::retry::{RetryPolicy, RetryingProvider};
use super::{LlmProvider, ProviderResult};
use crate::config::{AppConfig, ProviderKind, ProviderSettings};
use crate::error::ProviderError;

/// Create the active provider, wrapped in retry when configured
pub fn create_provider(config: &AppConfig) -> ProviderResult<Arc<dyn LlmProvider>> {
    let provider = create_provider_for(config.provider, config.active_provider(), config)?;

    if config.retry.max_attempts > 1 {
        let policy = RetryPolicy::from(&config.retry);
        Ok(Arc::new(RetryingProvider::new(provider, policy)))
    } else {
        Ok(provider)
    }
}

/// Create a bare provider of the given kind (no retry)
pub fn create_provider_for(
    kind: ProviderKind,
    settings: &ProviderSettings,
    config: &AppConfig,
) -> ProviderResult<Arc<dyn LlmProvider>> {
    let api_key = settings
        .api_key()
        .ok_or_else(|| {
            ProviderError::Config(format!(
                "no API key for '{}'; set providers.{}.api_key or {}",
                kind,
                kind,
                kind.api_key_env()
            ))
        })?
        .to_string();
    let timeout = config.generation.timeout();

    tracing::debug!("Creating {} provider", kind);

    match kind {
        ProviderKind::Claude => {
            let mut provider = ClaudeProvider::new(api_key)?.with_timeout(timeout);
            if let Some(m) = &settings.model {
                provider = provider.with_model(m.clone());
            }
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider))
        }

        ProviderKind::Openai | ProviderKind::Zhipu => {
            let mut provider = if kind == ProviderKind::Openai {
                OpenAIProvider::new_openai(api_key)?
            } else {
                OpenAIProvider::new_zhipu(api_key)?
            }
            .with_timeout(timeout);
            if let Some(m) = &settings.model {
                provider = provider.with_model(m.clone());
            }
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(kind: ProviderKind) -> AppConfig {
        let mut config = AppConfig::default();
        config.provider = kind;
        config.providers.get_mut(kind).api_key = Some("test-key".into());
        config
    }

    #[test]
    fn test_create_each_kind() {
        for kind in ProviderKind::ALL {
            let provider = create_provider(&config_for(kind)).unwrap();
            assert_eq!(provider.name(), kind.as_str());
            assert_eq!(provider.default_model(), kind.default_model());
        }
    }

    #[test]
    fn test_model_override() {
        let mut config = config_for(ProviderKind::Zhipu);
        config.providers.zhipu.model = Some("glm-4-flash".into());
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.default_model(), "glm-4-flash");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = AppConfig::default();
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_retry_disabled_still_builds() {
        let mut config = config_for(ProviderKind::Openai);
        config.retry.max_attempts = 1;
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
