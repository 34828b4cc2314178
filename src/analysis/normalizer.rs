//! Turns raw provider text into a validated [`AnalysisResult`].
//!
//! Nothing is defaulted: a response that does not satisfy the schema
//! contract in full is rejected with the raw text attached.

use crate::analysis::types::{AnalysisKind, AnalysisResult, GroundingSource, Market};
use crate::llm::{Citation, LLMResponse, ProviderId};
use crate::schema::{SchemaContract, SchemaViolation, StructuredPayload};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    #[error("Response is not valid JSON: {message}")]
    MalformedJson { message: String, raw: String },
    #[error("Response does not match the {kind} schema: {}", summarize(.violations))]
    SchemaMismatch {
        kind: AnalysisKind,
        violations: Vec<SchemaViolation>,
        raw: String,
    },
    #[error("Response could not be read as a {kind} payload: {message}")]
    PayloadMismatch {
        kind: AnalysisKind,
        message: String,
        raw: String,
    },
}

impl NormalizeError {
    pub fn raw_content(&self) -> &str {
        match self {
            NormalizeError::MalformedJson { raw, .. }
            | NormalizeError::SchemaMismatch { raw, .. }
            | NormalizeError::PayloadMismatch { raw, .. } => raw,
        }
    }
}

fn summarize(violations: &[SchemaViolation]) -> String {
    const SHOWN: usize = 5;
    let mut parts: Vec<String> = violations.iter().take(SHOWN).map(|v| v.to_string()).collect();
    if violations.len() > SHOWN {
        parts.push(format!("and {} more", violations.len() - SHOWN));
    }
    parts.join("; ")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(
        &self,
        kind: AnalysisKind,
        market: Market,
        provider: ProviderId,
        response: &LLMResponse,
    ) -> Result<AnalysisResult, NormalizeError> {
        let raw = response.content.as_str();
        let value = parse_json_object(raw)?;

        let contract = SchemaContract::for_kind(kind);
        if let Err(violations) = contract.validate(&value) {
            warn!(
                kind = %kind,
                violations = violations.len(),
                "Provider response failed schema validation"
            );
            return Err(NormalizeError::SchemaMismatch {
                kind,
                violations,
                raw: raw.to_string(),
            });
        }

        let payload = StructuredPayload::from_value(kind, value).map_err(|e| {
            NormalizeError::PayloadMismatch {
                kind,
                message: e.to_string(),
                raw: raw.to_string(),
            }
        })?;

        let grounding_sources = collect_grounding_sources(&response.citations);
        debug!(
            kind = %kind,
            sources = grounding_sources.len(),
            "Normalized provider response"
        );

        Ok(AnalysisResult::new(
            raw.to_string(),
            payload,
            grounding_sources,
            response.execution_time,
            provider,
            response.model_used.clone(),
            market,
        ))
    }
}

/// Parse the response body as a JSON value.
///
/// Well-formed JSON is taken as is. Otherwise a markdown ```json fence or
/// prose around the object is stripped first. A JSON string that itself
/// encodes the object is unwrapped.
pub fn parse_json_object(content: &str) -> Result<Value, NormalizeError> {
    let trimmed = content.trim();
    let parsed = serde_json::from_str::<Value>(trimmed)
        .or_else(|_| serde_json::from_str::<Value>(extract_json_candidate(trimmed)));

    let value = match parsed {
        Ok(Value::String(inner)) => serde_json::from_str::<Value>(&inner).map_err(|e| {
            NormalizeError::MalformedJson {
                message: format!("double-encoded payload is not JSON: {}", e),
                raw: content.to_string(),
            }
        })?,
        Ok(value) => value,
        Err(e) => {
            return Err(NormalizeError::MalformedJson {
                message: e.to_string(),
                raw: content.to_string(),
            });
        }
    };

    Ok(value)
}

fn extract_json_candidate(trimmed: &str) -> &str {
    if let Some(start) = trimmed.find("```") {
        let after_ticks = &trimmed[start + 3..];
        let body_start = after_ticks.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_ticks[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if trimmed.starts_with('"') {
        return trimmed;
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        (Some(start), _) => &trimmed[start..],
        _ => trimmed,
    }
}

/// Deduplicate citations by URI, keeping first-seen order and skipping blanks.
pub fn collect_grounding_sources(citations: &[Citation]) -> Vec<GroundingSource> {
    let mut seen = HashSet::new();
    let mut sources: Vec<GroundingSource> = Vec::new();

    for citation in citations {
        let uri = citation.uri.trim();
        if uri.is_empty() {
            continue;
        }
        let title = citation
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        if seen.insert(uri.to_string()) {
            sources.push(GroundingSource {
                uri: uri.to_string(),
                title,
            });
        } else if let Some(existing) = sources.iter_mut().find(|s| s.uri == uri)
            && existing.title.is_none()
        {
            existing.title = title;
        }
    }

    sources
}
