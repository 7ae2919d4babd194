use crate::config::Config;
use crate::error::ConfigError;
use crate::providers::{OllamaProvider, OpenAIProvider};
use crate::traits::Provider;
use std::sync::Arc;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

const GEMINI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "ROAM_GEMINI_API_KEY"];
const OPENAI_KEY_VARS: &[&str] = &["OPENAI_API_KEY", "ROAM_OPENAI_API_KEY"];

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>, ConfigError> {
    create_provider_with(config, |var| std::env::var(var).ok())
}

/// Same as [`create_provider`] with an explicit environment lookup.
pub fn create_provider_with<F>(config: &Config, lookup: F) -> Result<Arc<dyn Provider>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider_name = config.provider.to_lowercase();

    match provider_name.as_str() {
        "ollama" => {
            let mut provider = OllamaProvider::new()
                .with_model(config.model.clone())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" | "gemini" => {
            let (env_vars, default_base) = if provider_name == "gemini" {
                (GEMINI_KEY_VARS, GEMINI_BASE_URL)
            } else {
                (OPENAI_KEY_VARS, super::openai::OPENAI_BASE_URL)
            };

            let api_key = resolve_api_key_with_fallback(env_vars, &config.api_key, &lookup)
                .ok_or_else(|| ConfigError::MissingApiKey {
                    provider: provider_name.clone(),
                    env_vars: env_vars.join(", "),
                })?;

            let provider = OpenAIProvider::new(api_key)
                .with_name(provider_name.clone())
                .with_model(config.model.clone())
                .with_temperature(config.temperature)
                .with_base_url(config.base_url.clone().unwrap_or_else(|| default_base.to_string()));
            Ok(Arc::new(provider))
        }
        _ => Err(ConfigError::UnknownProvider(config.provider.clone())),
    }
}

fn resolve_api_key_with_fallback<F>(env_vars: &[&str], config_key: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env_vars
        .iter()
        .find_map(|var| lookup(var).filter(|key| !key.trim().is_empty()))
        .or_else(|| (!config_key.is_empty()).then(|| config_key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn gemini_is_default_and_needs_a_key() {
        let config = Config::default();
        let err = create_provider_with(&config, no_env).err().unwrap();
        assert!(matches!(err, ConfigError::MissingApiKey { ref provider, .. } if provider == "gemini"));

        let provider =
            create_provider_with(&config, |var| (var == "GOOGLE_API_KEY").then(|| "g".to_string()))
                .unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "gemini-2.0-flash");
    }

    #[test]
    fn env_key_wins_over_config_key() {
        let config = Config {
            provider: "openai".to_string(),
            api_key: "from-file".to_string(),
            ..Default::default()
        };
        let lookup = |var: &str| (var == "OPENAI_API_KEY").then(|| "from-env".to_string());
        assert_eq!(
            resolve_api_key_with_fallback(OPENAI_KEY_VARS, &config.api_key, &lookup).as_deref(),
            Some("from-env")
        );
        assert_eq!(
            resolve_api_key_with_fallback(OPENAI_KEY_VARS, &config.api_key, &no_env).as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = Config {
            provider: "Ollama".to_string(),
            model: "llama3.2".to_string(),
            ..Default::default()
        };
        let provider = create_provider_with(&config, no_env).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = Config {
            provider: "glm".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_provider_with(&config, no_env),
            Err(ConfigError::UnknownProvider(_))
        ));
    }
}
