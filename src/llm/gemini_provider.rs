//! Gemini `generateContent` strategy.
//!
//! The only backend with web-search grounding. Citations come back in
//! `groundingMetadata.groundingChunks[].web` of the first candidate.

use crate::llm::capability::{NegotiatedRequest, negotiate};
use crate::llm::provider::LLMProvider;
use crate::llm::types::{
    Citation, LLMError, LLMRequest, LLMResponse, ProviderConfig, ProviderId,
};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

pub struct GeminiProvider {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    request_timeout: Option<Duration>,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig, http: reqwest::Client) -> Result<Self, LLMError> {
        let base = config.base_url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{}/models/{}:generateContent", base, config.model))
            .map_err(|e| LLMError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key,
            model: config.model,
            request_timeout: config.request_timeout,
        })
    }

    fn build_body(negotiated: &NegotiatedRequest) -> GenerateContentRequest {
        let request = &negotiated.request;

        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        if let Some(image) = &request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: request.system_message.as_ref().map(|text| Content {
                role: None,
                parts: vec![Part::Text { text: text.clone() }],
            }),
            tools: negotiated
                .use_grounding
                .then(|| vec![Tool {
                    google_search: EmptyObject {},
                }]),
            generation_config: request.temperature.map(|temperature| GenerationConfig {
                temperature,
            }),
        }
    }
}

impl LLMProvider for GeminiProvider {
    fn execute_request(&self, request: LLMRequest) -> BoxFuture<'_, Result<LLMResponse, LLMError>> {
        let negotiated = negotiate(request, self.capabilities());
        let body = Self::build_body(&negotiated);
        let request_id = negotiated.request.id;

        Box::pin(async move {
            let start = Instant::now();
            debug!(model = %self.model, grounding = negotiated.use_grounding, "Sending Gemini request");

            let mut builder = self
                .http
                .post(self.endpoint.clone())
                .header("x-goog-api-key", &self.api_key)
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

            let envelope: GenerateContentResponse =
                serde_json::from_str(&text).map_err(|e| LLMError::MalformedResponse {
                    message: format!("unreadable generateContent envelope: {}", e),
                    raw: text.clone(),
                })?;

            let candidate = envelope.candidates.into_iter().next().ok_or_else(|| {
                LLMError::MalformedResponse {
                    message: "response carried no candidates".to_string(),
                    raw: text.clone(),
                }
            })?;

            let content: String = candidate
                .content
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                .unwrap_or_default();

            let citations = candidate
                .grounding_metadata
                .map(|meta| {
                    meta.grounding_chunks
                        .into_iter()
                        .filter_map(|chunk| chunk.web)
                        .filter_map(|web| {
                            web.uri.map(|uri| Citation {
                                uri,
                                title: web.title,
                            })
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            let execution_time = start.elapsed();
            info!(
                model = %self.model,
                citations = citations.len(),
                elapsed_ms = execution_time.as_millis() as u64,
                "Gemini request completed"
            );

            let mut provider_metadata = HashMap::new();
            if let Some(reason) = candidate.finish_reason {
                provider_metadata.insert("finish_reason".to_string(), serde_json::json!(reason));
            }
            provider_metadata.insert(
                "image_dropped".to_string(),
                serde_json::json!(negotiated.image_dropped),
            );

            Ok(LLMResponse {
                request_id,
                content,
                model_used: envelope.model_version.unwrap_or_else(|| self.model.clone()),
                citations,
                execution_time,
                provider_metadata,
            })
        })
    }

    fn provider_id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: EmptyObject,
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ImageInput;

    #[test]
    fn test_body_carries_search_tool_and_inline_image() {
        let request = LLMRequest {
            system_message: Some("system".to_string()),
            prompt: "prompt".to_string(),
            image: Some(ImageInput::new("image/png", "AAAA")),
            ..Default::default()
        };
        let negotiated = negotiate(request, ProviderId::Gemini.capabilities());
        let body = serde_json::to_value(GeminiProvider::build_body(&negotiated)).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "system");
        assert!(body["tools"][0]["googleSearch"].is_object());
        assert!(body.get("responseMimeType").is_none());
    }

    #[test]
    fn test_endpoint_includes_model() {
        let config = ProviderConfig::new(ProviderId::Gemini, "key")
            .with_base_url("http://localhost:1234/v1beta/")
            .with_model("gemini-test");
        let provider = GeminiProvider::new(config, reqwest::Client::new()).unwrap();
        assert_eq!(
            provider.endpoint.as_str(),
            "http://localhost:1234/v1beta/models/gemini-test:generateContent"
        );
    }
}
