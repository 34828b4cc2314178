//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./marketlens.toml or ./.marketlens/config.toml
//! 2. User config: ~/.marketlens/config.toml
//! 3. Built-in defaults

use crate::config::{AppSettings, ConfigError};
use crate::env;
use std::env as std_env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Settings plus the file they were read from, if any
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: AppSettings,
    pub source: Option<PathBuf>,
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `config_override` if given, else the first file in the hierarchy,
    /// else defaults.
    ///
    /// An explicit override that does not exist yet yields defaults, so
    /// `set-key --config new.toml` can create it.
    pub fn load(config_override: Option<&Path>) -> Result<LoadedSettings, ConfigError> {
        if let Some(path) = config_override {
            if path.is_file() {
                info!("Loading configuration override from: {:?}", path);
                return Ok(LoadedSettings {
                    settings: AppSettings::from_toml_file(path)?,
                    source: Some(path.to_path_buf()),
                });
            }
            info!("Configuration override {:?} not found, using defaults", path);
            return Ok(LoadedSettings {
                settings: AppSettings::default(),
                source: None,
            });
        }

        Self::discover_config()
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<LoadedSettings, ConfigError> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return Ok(LoadedSettings {
                settings: AppSettings::from_toml_file(&config_path)?,
                source: Some(config_path),
            });
        }

        info!("No configuration file found, using defaults");
        Ok(LoadedSettings {
            settings: AppSettings::default(),
            source: None,
        })
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::find_in(&Self::get_config_candidates())
    }

    fn find_in(candidates: &[PathBuf]) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate.clone());
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = Self::get_home_dir();
        Self::candidates_for(current_dir.as_deref(), home_dir.as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(env::standalone_config_file_path(current_dir));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Where an explicit save goes when no file was loaded: the user config
    pub fn default_save_path() -> Option<PathBuf> {
        Self::get_home_dir().map(|home| env::user_config_file_path(&home))
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_in(&candidates) {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}
