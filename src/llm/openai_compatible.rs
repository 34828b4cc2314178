//! `chat/completions` strategy shared by the OpenAI-compatible backends
//! (DeepSeek, Qwen via DashScope compatible mode).

use crate::llm::capability::{NegotiatedRequest, negotiate};
use crate::llm::provider::LLMProvider;
use crate::llm::types::{LLMError, LLMRequest, LLMResponse, ProviderConfig, ProviderId};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

pub struct OpenAiCompatibleProvider {
    provider: ProviderId,
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    request_timeout: Option<Duration>,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig, http: reqwest::Client) -> Result<Self, LLMError> {
        let base = config.base_url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{}/chat/completions", base))
            .map_err(|e| LLMError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;

        Ok(Self {
            provider: config.provider,
            http,
            endpoint,
            api_key: config.api_key,
            model: config.model,
            request_timeout: config.request_timeout,
        })
    }

    fn build_body(&self, negotiated: &NegotiatedRequest) -> Value {
        let request = &negotiated.request;
        let mut messages = Vec::new();
        if let Some(system) = &request.system_message {
            messages.push(json!({"role": "system", "content": system}));
        }

        let user_content = match &request.image {
            Some(image) => json!([
                {"type": "text", "text": request.prompt},
                {"type": "image_url", "image_url": {"url": image.data_uri()}}
            ]),
            None => json!(request.prompt),
        };
        messages.push(json!({"role": "user", "content": user_content}));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if negotiated.force_json {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

impl LLMProvider for OpenAiCompatibleProvider {
    fn execute_request(&self, request: LLMRequest) -> BoxFuture<'_, Result<LLMResponse, LLMError>> {
        let negotiated = negotiate(request, self.capabilities());
        let body = self.build_body(&negotiated);
        let request_id = negotiated.request.id;
        let image_dropped = negotiated.image_dropped;

        Box::pin(async move {
            let start = Instant::now();
            debug!(
                provider = %self.provider,
                model = %self.model,
                forced_json = negotiated.force_json,
                "Sending chat completion request"
            );

            let mut builder = self
                .http
                .post(self.endpoint.clone())
                .bearer_auth(&self.api_key)
                .json(&body);
            if let Some(timeout) = self.request_timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(LLMError::from_status(status.as_u16(), &text));
            }

            let envelope: ChatCompletionResponse =
                serde_json::from_str(&text).map_err(|e| LLMError::MalformedResponse {
                    message: format!("unreadable chat completion envelope: {}", e),
                    raw: text.clone(),
                })?;

            let choice = envelope.choices.into_iter().next().ok_or_else(|| {
                LLMError::MalformedResponse {
                    message: "response carried no choices".to_string(),
                    raw: text.clone(),
                }
            })?;

            let execution_time = start.elapsed();
            info!(
                provider = %self.provider,
                model = %self.model,
                elapsed_ms = execution_time.as_millis() as u64,
                "Chat completion request completed"
            );

            let mut provider_metadata = HashMap::new();
            if let Some(reason) = choice.finish_reason {
                provider_metadata.insert("finish_reason".to_string(), json!(reason));
            }
            if let Some(usage) = envelope.usage {
                provider_metadata.insert("usage".to_string(), usage);
            }
            provider_metadata.insert("image_dropped".to_string(), json!(image_dropped));

            Ok(LLMResponse {
                request_id,
                content: choice.message.content.unwrap_or_default(),
                model_used: envelope.model.unwrap_or_else(|| self.model.clone()),
                citations: Vec::new(),
                execution_time,
                provider_metadata,
            })
        })
    }

    fn provider_id(&self) -> ProviderId {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
