//! Model provider implementations for Sentinel.
//!
//! Every provider implements `sentinel_core::ModelProvider`.
//! [`build_from_config`] picks the backend named in configuration.

pub mod gemini;

use std::sync::Arc;

use sentinel_config::AppConfig;
use sentinel_core::error::ProviderError;
use sentinel_core::model::ModelProvider;

pub use gemini::GeminiProvider;

/// Build the configured provider.
///
/// Fails with `NotConfigured` when the API key is missing or the provider
/// name is not one we know.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key (run `sentinel onboard` or set SENTINEL_API_KEY / GEMINI_API_KEY)".into(),
            )
        })?;

    match config.model.provider.as_str() {
        "gemini" | "googleai" => {
            tracing::debug!(base_url = %config.model.api_url, "Using Gemini provider");
            Ok(Arc::new(
                GeminiProvider::new(api_key)
                    .with_base_url(&config.model.api_url)
                    .with_timeout(config.model.timeout_secs),
            ))
        }
        other => Err(ProviderError::NotConfigured(format!("unknown provider '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_configured() {
        let config = AppConfig::default();
        assert!(matches!(build_from_config(&config), Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn blank_key_is_not_configured() {
        let mut config = AppConfig::default();
        config.api_key = Some("   ".into());
        assert!(build_from_config(&config).is_err());
    }

    #[test]
    fn builds_gemini() {
        let mut config = AppConfig::default();
        config.api_key = Some("AIza-test".into());
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut config = AppConfig::default();
        config.api_key = Some("k".into());
        config.model.provider = "mystery".into();
        let err = build_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("mystery"));
    }
}
