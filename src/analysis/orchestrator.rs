//! Top-level entry point for one analysis.
//!
//! Each call is stamped with a per-surface generation when it is issued. A
//! newer call on the same surface supersedes older ones: their outcomes are
//! dropped instead of overwriting what the surface currently shows.

use crate::analysis::error::{AnalysisFailure, ClassifiedError, ErrorClassifier, ErrorKind};
use crate::analysis::normalizer::ResponseNormalizer;
use crate::analysis::types::{AnalysisRequest, AnalysisResult};
use crate::config::{AppSettings, SettingsHandle};
use crate::llm::{CredentialResolver, LLMError, LLMProvider, LLMRequest, ProviderId, ProviderInvoker};
use crate::prompt::{PromptBuilder, PromptDirective};
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A display area whose visible outcome is owned by its latest request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(Arc<str>);

impl SurfaceId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SurfaceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generation stamp taken when a call is issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub surface: SurfaceId,
    pub generation: u64,
}

pub type Outcome = Result<AnalysisResult, ClassifiedError>;

#[derive(Debug, Clone)]
pub enum SurfaceOutcome {
    /// The call was still current and its outcome is now visible
    Committed(Outcome),
    /// A newer call was issued meanwhile; this outcome was discarded
    Superseded { generation: u64, current: u64 },
}

impl SurfaceOutcome {
    pub fn is_superseded(&self) -> bool {
        matches!(self, SurfaceOutcome::Superseded { .. })
    }

    pub fn committed(&self) -> Option<&Outcome> {
        match self {
            SurfaceOutcome::Committed(outcome) => Some(outcome),
            SurfaceOutcome::Superseded { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct SurfaceSlot {
    generation: u64,
    visible: Option<Outcome>,
}

/// Per-surface generation counters and visible outcomes.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    slots: DashMap<SurfaceId, SurfaceSlot>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next generation for `surface`. Strictly increasing per surface.
    pub fn issue(&self, surface: &SurfaceId) -> Ticket {
        let mut slot = self.slots.entry(surface.clone()).or_default();
        slot.generation += 1;
        Ticket {
            surface: surface.clone(),
            generation: slot.generation,
        }
    }

    /// Make `outcome` visible if `ticket` is still the newest for its surface.
    pub fn commit(&self, ticket: &Ticket, outcome: Outcome) -> SurfaceOutcome {
        match self.slots.get_mut(&ticket.surface) {
            Some(mut slot) if slot.generation == ticket.generation => {
                slot.visible = Some(outcome.clone());
                SurfaceOutcome::Committed(outcome)
            }
            Some(slot) => SurfaceOutcome::Superseded {
                generation: ticket.generation,
                current: slot.generation,
            },
            None => SurfaceOutcome::Superseded {
                generation: ticket.generation,
                current: 0,
            },
        }
    }

    pub fn current_generation(&self, surface: &SurfaceId) -> u64 {
        self.slots
            .get(surface)
            .map(|slot| slot.generation)
            .unwrap_or(0)
    }

    /// Outcome currently visible on `surface`
    pub fn latest(&self, surface: &SurfaceId) -> Option<Outcome> {
        self.slots.get(surface).and_then(|slot| slot.visible.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    Building,
    Invoking,
    Validating,
    Done,
    Failed(ErrorKind),
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvocationState::Done | InvocationState::Failed(_))
    }

    pub fn can_advance_to(&self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, Invoking)
                | (Invoking, Validating)
                | (Validating, Done)
                | (Building | Invoking | Validating, Failed(_))
        )
    }
}

/// Lifecycle tracker for a single call.
#[derive(Debug, Clone)]
pub struct Invocation {
    id: Uuid,
    state: InvocationState,
    history: Vec<InvocationState>,
}

impl Invocation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: InvocationState::Idle,
            history: vec![InvocationState::Idle],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Every state visited, starting with `Idle`
    pub fn history(&self) -> &[InvocationState] {
        &self.history
    }

    /// Move to `next`. Illegal transitions are refused and leave the state unchanged.
    pub fn advance(&mut self, next: InvocationState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(invocation = %self.id, from = ?self.state, to = ?next, "Refused state transition");
            return false;
        }
        debug!(invocation = %self.id, from = ?self.state, to = ?next, "Invocation state change");
        self.state = next;
        self.history.push(next);
        true
    }
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes prompt building, provider invocation and normalization.
pub struct AnalysisOrchestrator {
    settings: SettingsHandle,
    credentials: CredentialResolver,
    http: reqwest::Client,
    prompts: PromptBuilder,
    normalizer: ResponseNormalizer,
    surfaces: SurfaceRegistry,
}

impl AnalysisOrchestrator {
    /// Orchestrator reading credentials from the process environment
    pub fn new(settings: SettingsHandle) -> Result<Self, LLMError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("marketlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LLMError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_parts(settings, CredentialResolver::from_env(), http))
    }

    pub fn with_parts(
        settings: SettingsHandle,
        credentials: CredentialResolver,
        http: reqwest::Client,
    ) -> Self {
        Self {
            settings,
            credentials,
            http,
            prompts: PromptBuilder::new(),
            normalizer: ResponseNormalizer::new(),
            surfaces: SurfaceRegistry::new(),
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    /// Outcome currently visible on `surface`
    pub fn latest(&self, surface: &SurfaceId) -> Option<Outcome> {
        self.surfaces.latest(surface)
    }

    /// Build the directive a request would send to `provider`, or the
    /// configured default provider, without any network access.
    pub fn preview(
        &self,
        request: &AnalysisRequest,
        provider: Option<ProviderId>,
    ) -> Result<PromptDirective, ClassifiedError> {
        let provider = provider.unwrap_or(self.settings.snapshot().default_provider);
        self.prompts
            .build(request, provider.capabilities())
            .map_err(|e| ErrorClassifier::classify(e.into()))
    }

    /// Run `request` against `provider`, or the configured default provider.
    ///
    /// The generation is taken and the settings snapshot read before this
    /// returns, so call order decides which outcome a surface keeps.
    pub fn analyze_with_llm<'a>(
        &'a self,
        surface: &SurfaceId,
        request: AnalysisRequest,
        provider: Option<ProviderId>,
    ) -> impl Future<Output = SurfaceOutcome> + use<'a> {
        let ticket = self.surfaces.issue(surface);
        let settings = self.settings.snapshot();
        let provider = provider.unwrap_or(settings.default_provider);

        async move {
            let mut invocation = Invocation::new();
            invocation.advance(InvocationState::Building);

            let outcome = match self.build_invoker(provider, &settings) {
                Ok(invoker) => self.execute(&request, &invoker, &mut invocation).await,
                Err(err) => Err(err.into()),
            };

            self.finish(ticket, invocation, outcome)
        }
    }

    /// Same pipeline with a caller-supplied provider and no credential lookup.
    pub fn analyze_with<'a, P>(
        &'a self,
        surface: &SurfaceId,
        request: AnalysisRequest,
        provider: &'a P,
    ) -> impl Future<Output = SurfaceOutcome> + use<'a, P>
    where
        P: LLMProvider + ?Sized,
    {
        let ticket = self.surfaces.issue(surface);

        async move {
            let mut invocation = Invocation::new();
            invocation.advance(InvocationState::Building);
            let outcome = self.execute(&request, provider, &mut invocation).await;
            self.finish(ticket, invocation, outcome)
        }
    }

    fn build_invoker(
        &self,
        provider: ProviderId,
        settings: &AppSettings,
    ) -> Result<ProviderInvoker, LLMError> {
        let config = self.credentials.provider_config(provider, settings)?;
        debug!(?config, "Resolved provider config");
        ProviderInvoker::from_config(config, self.http.clone())
    }

    async fn execute<P>(
        &self,
        request: &AnalysisRequest,
        provider: &P,
        invocation: &mut Invocation,
    ) -> Result<AnalysisResult, AnalysisFailure>
    where
        P: LLMProvider + ?Sized,
    {
        let directive = self.prompts.build(request, provider.capabilities())?;
        let llm_request = LLMRequest::from(directive);

        invocation.advance(InvocationState::Invoking);
        info!(
            invocation = %invocation.id(),
            provider = %provider.provider_id(),
            model = provider.model(),
            kind = %request.kind,
            market = %request.market,
            "Starting analysis"
        );
        let start = Instant::now();
        let response = provider.execute_request(llm_request).await?;
        debug!(
            invocation = %invocation.id(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = response.content.len(),
            "Provider responded"
        );

        invocation.advance(InvocationState::Validating);
        let result = self.normalizer.normalize(
            request.kind,
            request.market,
            provider.provider_id(),
            &response,
        )?;
        Ok(result)
    }

    fn finish(
        &self,
        ticket: Ticket,
        mut invocation: Invocation,
        outcome: Result<AnalysisResult, AnalysisFailure>,
    ) -> SurfaceOutcome {
        let outcome = match outcome {
            Ok(result) => {
                invocation.advance(InvocationState::Done);
                info!(
                    invocation = %invocation.id(),
                    kind = %result.kind(),
                    provider = %result.provider_used(),
                    elapsed_ms = result.elapsed().as_millis() as u64,
                    sources = result.grounding_sources().len(),
                    "Analysis completed"
                );
                Ok(result)
            }
            Err(failure) => {
                let classified = ErrorClassifier::classify(failure);
                invocation.advance(InvocationState::Failed(classified.kind));
                warn!(
                    invocation = %invocation.id(),
                    kind = %classified.kind,
                    "Analysis failed: {}",
                    classified.message
                );
                Err(classified)
            }
        };

        let committed = self.surfaces.commit(&ticket, outcome);
        if let SurfaceOutcome::Superseded {
            generation,
            current,
        } = &committed
        {
            warn!(
                surface = %ticket.surface,
                generation,
                current,
                "Discarding superseded outcome"
            );
        }
        committed
    }
}
