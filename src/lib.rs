//! # MarketLens
//!
//! Structured financial-market analysis produced by generative-AI providers.
//! A request (market, horizon, query, optional screenshot, optional price
//! anchor) becomes a validated, provider-agnostic result, regardless of which
//! backend served it or what that backend can do.
//!
//! ## Architecture Overview
//!
//! - **[`schema`]**: Per-kind schema contracts and typed payloads
//! - **[`prompt`]**: Directive construction with data-priority rules
//! - **[`llm`]**: Provider capabilities, credentials and backend strategies
//! - **[`analysis`]**: Normalization, error classification and orchestration
//! - **[`config`]**: TOML-persisted settings and the shared snapshot handle
//!
//! ## Features
//!
//! ### Providers
//! - **Gemini**: web-search grounding with citations, vision input
//! - **DeepSeek**: forced JSON output, text only
//! - **Qwen**: vision input through the DashScope compatible endpoint
//!
//! ### Guarantees
//! - **Fail closed**: a response that misses any required field is a
//!   validation error, never a partially filled result
//! - **Graceful degradation**: an image sent to a text-only backend is
//!   dropped and the prompt says so
//! - **Latest wins**: a slow, older call never overwrites a newer one on the
//!   same surface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marketlens::analysis::{AnalysisKind, AnalysisOrchestrator, AnalysisRequest, Market, SurfaceId};
//! use marketlens::config::{AppSettings, SettingsHandle};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = AnalysisOrchestrator::new(SettingsHandle::new(AppSettings::default()))?;
//!     let request = AnalysisRequest::new(AnalysisKind::Timing, Market::CN, "000001");
//!
//!     let outcome = orchestrator
//!         .analyze_with_llm(&SurfaceId::from("timing"), request, None)
//!         .await;
//!
//!     if let Some(Ok(result)) = outcome.committed() {
//!         println!("{}", serde_json::to_string_pretty(&result.envelope())?);
//!     }
//!     Ok(())
//! }
//! ```

/// Analysis orchestration.
///
/// Drives one request through prompt building, provider invocation and
/// normalization, and classifies failures into a closed taxonomy.
pub mod analysis;

/// Command line interface: argument parsing and configuration discovery.
pub mod cli;

/// Persisted provider settings.
pub mod config;

/// Environment constants and path utilities.
pub mod env;

/// Provider-agnostic LLM interface.
///
/// Capability negotiation, credential resolution and one strategy per
/// backend behind the [`llm::LLMProvider`] trait.
pub mod llm;

/// Prompt construction per analysis kind.
pub mod prompt;

/// Schema contracts and the structured payload union.
pub mod schema;

pub use analysis::{
    AnalysisKind, AnalysisOrchestrator, AnalysisRequest, AnalysisResult, ClassifiedError,
    ErrorKind, Market, Period, SurfaceId, SurfaceOutcome,
};
pub use config::{AppSettings, SettingsHandle};
pub use llm::{LLMProvider, ProviderId};
