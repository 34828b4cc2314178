//! Closed failure taxonomy exposed to callers.
//!
//! Lower layers raise their own typed errors; classification happens once,
//! at the orchestrator boundary.

use crate::analysis::normalizer::NormalizeError;
use crate::llm::LLMError;
use crate::prompt::PromptError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Credential missing or rejected
    Auth,
    /// Balance or rate-limit exhaustion reported by the backend
    Quota,
    /// Transport failure or an unrelated non-2xx response
    Network,
    /// Blank input, unparseable output or a schema mismatch
    Validation,
}

/// What a caller should show for a failure. None of them retries on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    ConfigureCredentials,
    ShowBackendMessage,
    ShowGenericFailure,
}

impl ErrorKind {
    pub fn user_action(&self) -> UserAction {
        match self {
            ErrorKind::Auth => UserAction::ConfigureCredentials,
            ErrorKind::Quota | ErrorKind::Network => UserAction::ShowBackendMessage,
            ErrorKind::Validation => UserAction::ShowGenericFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Quota => "quota",
            ErrorKind::Network => "network",
            ErrorKind::Validation => "validation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Error)]
#[error("{kind} error: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Provider output that failed validation, kept for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raw_content: None,
        }
    }

    pub fn with_raw_content(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = Some(raw.into());
        self
    }

    /// Text suitable for direct display
    pub fn user_message(&self) -> String {
        match self.kind.user_action() {
            UserAction::ConfigureCredentials => format!(
                "{}. Configure an API key for this provider and try again.",
                self.message
            ),
            UserAction::ShowBackendMessage => self.message.clone(),
            UserAction::ShowGenericFailure => format!("Analysis failed: {}", self.message),
        }
    }
}

/// Every typed failure an invocation can raise before classification
#[derive(Debug, Error)]
pub enum AnalysisFailure {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Provider(#[from] LLMError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify(failure: AnalysisFailure) -> ClassifiedError {
        match failure {
            AnalysisFailure::Prompt(err) => ClassifiedError::new(ErrorKind::Validation, err.to_string()),
            AnalysisFailure::Provider(err) => Self::classify_provider(err),
            AnalysisFailure::Normalize(err) => {
                let raw = err.raw_content().to_string();
                ClassifiedError::new(ErrorKind::Validation, err.to_string()).with_raw_content(raw)
            }
        }
    }

    fn classify_provider(error: LLMError) -> ClassifiedError {
        match error {
            LLMError::MissingCredential { provider } => {
                let (primary, alias) = provider.credential_env();
                ClassifiedError::new(
                    ErrorKind::Auth,
                    format!(
                        "No API key configured for {} (set {} or {}, or save one with `set-key`)",
                        provider.display_name(),
                        primary,
                        alias
                    ),
                )
            }
            LLMError::Authentication(message) => ClassifiedError::new(ErrorKind::Auth, message),
            LLMError::Quota(message) => ClassifiedError::new(ErrorKind::Quota, message),
            LLMError::Network(message) => ClassifiedError::new(ErrorKind::Network, message),
            LLMError::InvalidEndpoint(message) => {
                ClassifiedError::new(ErrorKind::Network, format!("invalid endpoint: {}", message))
            }
            LLMError::MalformedResponse { message, raw } => {
                ClassifiedError::new(ErrorKind::Validation, message).with_raw_content(raw)
            }
        }
    }
}
