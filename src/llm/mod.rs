//! Provider abstraction and the concrete backend strategies.

pub mod capability;
pub mod credentials;
pub mod gemini_provider;
pub mod openai_compatible;
pub mod provider;
pub mod types;

pub use credentials::{CredentialResolver, CredentialSource, ResolvedCredential};
pub use gemini_provider::GeminiProvider;
pub use openai_compatible::OpenAiCompatibleProvider;
pub use provider::{LLMProvider, ProviderInvoker};
pub use types::*;
