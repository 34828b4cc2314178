use crate::llm::gemini_provider::GeminiProvider;
use crate::llm::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::{
    LLMError, LLMRequest, LLMResponse, ProviderCapabilities, ProviderConfig, ProviderId,
};
use futures::future::BoxFuture;

/// Backend strategy seam. Test doubles implement this directly.
pub trait LLMProvider: Send + Sync {
    /// Execute a single request. Implementations make exactly one network
    /// call and never retry.
    fn execute_request(&self, request: LLMRequest) -> BoxFuture<'_, Result<LLMResponse, LLMError>>;

    /// Fixed capability triple of this backend
    fn capabilities(&self) -> ProviderCapabilities {
        self.provider_id().capabilities()
    }

    fn provider_id(&self) -> ProviderId;

    /// Model name sent with each request
    fn model(&self) -> &str;
}

/// Closed dispatch over the concrete backends.
pub enum ProviderInvoker {
    Gemini(GeminiProvider),
    OpenAiCompatible(OpenAiCompatibleProvider),
}

impl ProviderInvoker {
    /// Build the strategy for `config.provider`, sharing `http` between calls.
    pub fn from_config(config: ProviderConfig, http: reqwest::Client) -> Result<Self, LLMError> {
        match config.provider {
            ProviderId::Gemini => Ok(ProviderInvoker::Gemini(GeminiProvider::new(config, http)?)),
            ProviderId::DeepSeek | ProviderId::Qwen => Ok(ProviderInvoker::OpenAiCompatible(
                OpenAiCompatibleProvider::new(config, http)?,
            )),
        }
    }
}

impl LLMProvider for ProviderInvoker {
    fn execute_request(&self, request: LLMRequest) -> BoxFuture<'_, Result<LLMResponse, LLMError>> {
        match self {
            ProviderInvoker::Gemini(provider) => provider.execute_request(request),
            ProviderInvoker::OpenAiCompatible(provider) => provider.execute_request(request),
        }
    }

    fn provider_id(&self) -> ProviderId {
        match self {
            ProviderInvoker::Gemini(provider) => provider.provider_id(),
            ProviderInvoker::OpenAiCompatible(provider) => provider.provider_id(),
        }
    }

    fn model(&self) -> &str {
        match self {
            ProviderInvoker::Gemini(provider) => provider.model(),
            ProviderInvoker::OpenAiCompatible(provider) => provider.model(),
        }
    }
}
