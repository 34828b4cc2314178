//! Analysis orchestration.
//!
//! [`AnalysisOrchestrator`] drives one request through prompt building,
//! provider invocation and response normalization, and classifies any
//! failure into an [`ErrorKind`].

pub mod error;
pub mod normalizer;
pub mod orchestrator;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{AnalysisFailure, ClassifiedError, ErrorClassifier, ErrorKind, UserAction};
pub use normalizer::{NormalizeError, ResponseNormalizer};
pub use orchestrator::{
    AnalysisOrchestrator, Invocation, InvocationState, Outcome, SurfaceId, SurfaceOutcome,
    SurfaceRegistry, Ticket,
};
pub use types::{
    AnalysisKind, AnalysisRequest, AnalysisResult, GroundingSource, ImageInput, Market, Period,
    ResultEnvelope,
};
