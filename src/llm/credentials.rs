//! Credential sourcing.
//!
//! Order per provider: a key the user explicitly saved, the primary
//! environment variable, the alias variable, then any other key found in
//! the settings file.

use crate::config::AppSettings;
use crate::llm::types::{LLMError, ProviderConfig, ProviderId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Where a resolved key came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    SavedByUser,
    Environment(&'static str),
    SettingsFile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::SavedByUser => f.write_str("saved key"),
            CredentialSource::Environment(var) => write!(f, "environment ({})", var),
            CredentialSource::SettingsFile => f.write_str("settings file"),
        }
    }
}

#[derive(Clone)]
pub struct ResolvedCredential {
    pub api_key: String,
    pub source: CredentialSource,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("api_key", &crate::llm::types::mask_secret(&self.api_key))
            .field("source", &self.source)
            .finish()
    }
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Resolves provider keys against settings and an injectable environment.
#[derive(Clone)]
pub struct CredentialResolver {
    lookup: Arc<EnvLookup>,
}

impl CredentialResolver {
    /// Read from the process environment
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    pub fn resolve(
        &self,
        provider: ProviderId,
        settings: &AppSettings,
    ) -> Option<ResolvedCredential> {
        let stored = settings
            .provider(provider)
            .and_then(|p| p.api_key.as_deref().map(|key| (key, p.saved_by_user)))
            .filter(|(key, _)| !key.trim().is_empty());

        if let Some((key, true)) = stored {
            return Some(ResolvedCredential {
                api_key: key.trim().to_string(),
                source: CredentialSource::SavedByUser,
            });
        }

        let (primary, alias) = provider.credential_env();
        for var in [primary, alias] {
            if let Some(value) = (self.lookup)(var).filter(|v| !v.trim().is_empty()) {
                return Some(ResolvedCredential {
                    api_key: value.trim().to_string(),
                    source: CredentialSource::Environment(var),
                });
            }
        }

        stored.map(|(key, _)| ResolvedCredential {
            api_key: key.trim().to_string(),
            source: CredentialSource::SettingsFile,
        })
    }

    /// Build the read-only config for one invocation.
    ///
    /// Fails with [`LLMError::MissingCredential`] when no key is available.
    pub fn provider_config(
        &self,
        provider: ProviderId,
        settings: &AppSettings,
    ) -> Result<ProviderConfig, LLMError> {
        let credential = self
            .resolve(provider, settings)
            .ok_or(LLMError::MissingCredential { provider })?;

        let mut config = ProviderConfig::new(provider, credential.api_key)
            .with_timeout(settings.request_timeout_secs.map(Duration::from_secs));

        if let Some(overrides) = settings.provider(provider) {
            if let Some(base_url) = overrides.base_url.as_deref().filter(|s| !s.is_empty()) {
                config = config.with_base_url(base_url);
            }
            if let Some(model) = overrides.model.as_deref().filter(|s| !s.is_empty()) {
                config = config.with_model(model);
            }
        }

        Ok(config)
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use std::collections::HashMap;

    fn resolver(vars: &[(&str, &str)]) -> CredentialResolver {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CredentialResolver::with_lookup(move |name| vars.get(name).cloned())
    }

    fn settings_with_key(provider: ProviderId, key: &str, saved_by_user: bool) -> AppSettings {
        let mut settings = AppSettings::default();
        settings.providers.insert(
            provider.as_str().to_string(),
            ProviderSettings {
                api_key: Some(key.to_string()),
                saved_by_user,
                ..Default::default()
            },
        );
        settings
    }

    #[test]
    fn test_saved_key_overrides_environment() {
        let settings = settings_with_key(ProviderId::DeepSeek, "saved", true);
        let resolved = resolver(&[("DEEPSEEK_API_KEY", "env")])
            .resolve(ProviderId::DeepSeek, &settings)
            .unwrap();
        assert_eq!(resolved.api_key, "saved");
        assert_eq!(resolved.source, CredentialSource::SavedByUser);
    }

    #[test]
    fn test_primary_env_beats_alias_and_unsaved_file_key() {
        let settings = settings_with_key(ProviderId::Gemini, "file", false);
        let resolved = resolver(&[("GEMINI_API_KEY", "primary"), ("API_KEY", "alias")])
            .resolve(ProviderId::Gemini, &settings)
            .unwrap();
        assert_eq!(resolved.api_key, "primary");
        assert_eq!(
            resolved.source,
            CredentialSource::Environment("GEMINI_API_KEY")
        );
    }

    #[test]
    fn test_alias_env_is_used_when_primary_blank() {
        let resolved = resolver(&[("DASHSCOPE_API_KEY", "  "), ("VITE_QWEN_API_KEY", "alias")])
            .resolve(ProviderId::Qwen, &AppSettings::default())
            .unwrap();
        assert_eq!(resolved.api_key, "alias");
    }

    #[test]
    fn test_unsaved_file_key_is_last_resort() {
        let settings = settings_with_key(ProviderId::Qwen, "file", false);
        let resolved = resolver(&[]).resolve(ProviderId::Qwen, &settings).unwrap();
        assert_eq!(resolved.source, CredentialSource::SettingsFile);
    }

    #[test]
    fn test_missing_credential() {
        let result = resolver(&[]).provider_config(ProviderId::DeepSeek, &AppSettings::default());
        assert!(matches!(
            result,
            Err(LLMError::MissingCredential {
                provider: ProviderId::DeepSeek
            })
        ));
    }

    #[test]
    fn test_provider_config_applies_overrides_and_timeout() {
        let mut settings = settings_with_key(ProviderId::DeepSeek, "saved", true);
        settings.request_timeout_secs = Some(30);
        if let Some(entry) = settings.providers.get_mut("deepseek") {
            entry.model = Some("deepseek-reasoner".to_string());
        }

        let config = resolver(&[])
            .provider_config(ProviderId::DeepSeek, &settings)
            .unwrap();
        assert_eq!(config.model, "deepseek-reasoner");
        assert_eq!(config.base_url, ProviderId::DeepSeek.default_base_url());
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    }
}
