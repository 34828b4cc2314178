use crate::analysis::ImageInput;
use crate::env::{credentials, endpoints};
use crate::prompt::PromptDirective;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Supported backends. Dispatch over this enum is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Global provider with web-search grounding and vision
    #[default]
    Gemini,
    /// Region-specific provider with forced JSON output, text only
    DeepSeek,
    /// Region-specific vision provider without forced JSON
    Qwen,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Gemini, ProviderId::DeepSeek, ProviderId::Qwen];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Qwen => "qwen",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "Google Gemini",
            ProviderId::DeepSeek => "DeepSeek",
            ProviderId::Qwen => "Alibaba Qwen",
        }
    }

    /// Fixed capability triple of the backend
    pub fn capabilities(&self) -> ProviderCapabilities {
        match self {
            ProviderId::Gemini => ProviderCapabilities {
                supports_vision: true,
                supports_web_search: true,
                // generateContent rejects a JSON response MIME type alongside the search tool
                supports_forced_json: false,
            },
            ProviderId::DeepSeek => ProviderCapabilities {
                supports_vision: false,
                supports_web_search: false,
                supports_forced_json: true,
            },
            ProviderId::Qwen => ProviderCapabilities {
                supports_vision: true,
                supports_web_search: false,
                supports_forced_json: false,
            },
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::Gemini => endpoints::GEMINI_BASE_URL,
            ProviderId::DeepSeek => endpoints::DEEPSEEK_BASE_URL,
            ProviderId::Qwen => endpoints::QWEN_BASE_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::Gemini => endpoints::GEMINI_DEFAULT_MODEL,
            ProviderId::DeepSeek => endpoints::DEEPSEEK_DEFAULT_MODEL,
            ProviderId::Qwen => endpoints::QWEN_DEFAULT_MODEL,
        }
    }

    /// Primary and alias environment variables, in lookup order
    pub fn credential_env(&self) -> (&'static str, &'static str) {
        match self {
            ProviderId::Gemini => (credentials::GEMINI_PRIMARY, credentials::GEMINI_ALIAS),
            ProviderId::DeepSeek => (credentials::DEEPSEEK_PRIMARY, credentials::DEEPSEEK_ALIAS),
            ProviderId::Qwen => (credentials::QWEN_PRIMARY, credentials::QWEN_ALIAS),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderId::Gemini),
            "deepseek" => Ok(ProviderId::DeepSeek),
            "qwen" | "dashscope" | "tongyi" => Ok(ProviderId::Qwen),
            other => Err(format!(
                "unknown provider '{}'. Expected gemini, deepseek or qwen",
                other
            )),
        }
    }
}

/// What a backend can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub supports_vision: bool,
    pub supports_web_search: bool,
    pub supports_forced_json: bool,
}

/// Resolved, read-only settings for one invocation
#[derive(Clone)]
pub struct ProviderConfig {
    pub provider: ProviderId,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// `None` waits for the backend indefinitely
    pub request_timeout: Option<Duration>,
}

impl ProviderConfig {
    pub fn new(provider: ProviderId, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            request_timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Show only the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Provider-agnostic request produced from a prompt directive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub id: Uuid,
    pub system_message: Option<String>,
    pub prompt: String,
    pub image: Option<ImageInput>,
    pub temperature: Option<f32>,
}

impl Default for LLMRequest {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            system_message: None,
            prompt: String::new(),
            image: None,
            temperature: Some(0.3),
        }
    }
}

impl From<PromptDirective> for LLMRequest {
    fn from(directive: PromptDirective) -> Self {
        Self {
            system_message: Some(directive.system_message),
            prompt: directive.prompt,
            image: directive.image,
            ..Default::default()
        }
    }
}

/// Citation metadata as reported by the backend, possibly with duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: Option<String>,
}

/// Raw text plus metadata returned by one backend call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub request_id: Uuid,
    pub content: String,
    pub model_used: String,
    pub citations: Vec<Citation>,
    pub execution_time: Duration,
    pub provider_metadata: HashMap<String, serde_json::Value>,
}

/// Typed failures raised by invokers
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("No API key configured for provider '{provider}'")]
    MissingCredential { provider: ProviderId },
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Quota exhausted: {0}")]
    Quota(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Malformed provider response: {message}")]
    MalformedResponse { message: String, raw: String },
}

impl LLMError {
    /// Map a non-2xx HTTP response to a typed failure.
    ///
    /// The backend's own message is kept verbatim.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = backend_message(body);
        let lower = message.to_lowercase();

        match status {
            _ if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) => LLMError::Quota(message),
            401 | 403 => LLMError::Authentication(message),
            402 | 429 => LLMError::Quota(message),
            _ if AUTH_MARKERS.iter().any(|m| lower.contains(m)) => {
                LLMError::Authentication(message)
            }
            _ => LLMError::Network(format!("HTTP {}: {}", status, message)),
        }
    }
}

const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "resource_exhausted",
    "insufficient balance",
    "insufficient_quota",
    "rate limit",
];

const AUTH_MARKERS: &[&str] = &[
    "api key not valid",
    "api_key_invalid",
    "invalid api key",
    "incorrect api key",
    "invalid_api_key",
];

/// Pull `error.message` out of a JSON error body, falling back to the raw text
fn backend_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.chars().take(500).collect(),
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            LLMError::Network(format!("request timed out: {}", error))
        } else {
            LLMError::Network(error.to_string())
        }
    }
}
