//! Environment constants and path utilities.
//!
//! This module centralizes hardcoded paths, file names, environment variable
//! names and provider endpoints used throughout the application, making them
//! easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".marketlens";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Stand-alone configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "marketlens.toml";

/// Environment variables that may carry provider credentials.
///
/// Each provider has a primary variable and an alias used by alternate
/// deployment toolchains (bundlers that only expose prefixed variables).
pub mod credentials {
    pub const GEMINI_PRIMARY: &str = "GEMINI_API_KEY";
    pub const GEMINI_ALIAS: &str = "API_KEY";

    pub const DEEPSEEK_PRIMARY: &str = "DEEPSEEK_API_KEY";
    pub const DEEPSEEK_ALIAS: &str = "VITE_DEEPSEEK_API_KEY";

    pub const QWEN_PRIMARY: &str = "DASHSCOPE_API_KEY";
    pub const QWEN_ALIAS: &str = "VITE_QWEN_API_KEY";
}

/// Default REST endpoints and models per provider
pub mod endpoints {
    pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

    pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
    pub const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

    pub const QWEN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
    pub const QWEN_DEFAULT_MODEL: &str = "qwen-vl-max";
}

/// Build the application directory path from a base directory
pub fn app_dir_path(base: &Path) -> PathBuf {
    base.join(APP_DIR_NAME)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    app_dir_path(home_dir)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build config file path inside the current directory's application directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    app_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the stand-alone config file path in the current directory
pub fn standalone_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}
