//! Persisted provider settings.
//!
//! Loaded explicitly at startup and saved explicitly on user action. The
//! analysis core only ever reads an immutable snapshot through
//! [`SettingsHandle`].

use crate::llm::{ProviderId, mask_secret};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Unknown provider '{0}' in settings")]
    UnknownProvider(String),
}

/// Per-provider overrides and stored credential.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Set when the key was entered through `set-key`; such a key wins over
    /// the environment.
    #[serde(default)]
    pub saved_by_user: bool,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("saved_by_user", &self.saved_by_user)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub default_provider: ProviderId,
    /// Per-request timeout. Absent means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Keyed by provider id (`gemini`, `deepseek`, `qwen`)
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl AppSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: AppSettings = toml::from_str(content)?;
        if let Some(unknown) = settings
            .providers
            .keys()
            .find(|key| key.parse::<ProviderId>().is_err())
        {
            return Err(ConfigError::UnknownProvider(unknown.clone()));
        }
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Save to TOML file, creating parent directories as needed
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)?;
        debug!("Wrote settings to {:?}", path);
        Ok(())
    }

    pub fn provider(&self, provider: ProviderId) -> Option<&ProviderSettings> {
        self.providers.get(provider.as_str())
    }

    /// Record a key the user entered explicitly. It then overrides the environment.
    pub fn save_provider_key(&mut self, provider: ProviderId, api_key: impl Into<String>) {
        let entry = self
            .providers
            .entry(provider.as_str().to_string())
            .or_default();
        entry.api_key = Some(api_key.into().trim().to_string());
        entry.saved_by_user = true;
        info!(provider = %provider, "Saved provider key");
    }
}

/// Shared, swappable settings snapshot.
///
/// Readers get an `Arc` and never hold the lock across an await.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Arc<AppSettings>>>,
}

impl SettingsHandle {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(settings))),
        }
    }

    pub fn snapshot(&self) -> Arc<AppSettings> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in new settings; the next invocation observes them.
    pub fn replace(&self, settings: AppSettings) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(settings);
    }
}
