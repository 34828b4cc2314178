use super::*;
use crate::config::{AppSettings, SettingsHandle};
use crate::llm::{
    CredentialResolver, LLMError, LLMProvider, LLMRequest, LLMResponse, ProviderId,
};
use crate::schema::TimingAction;
use crate::schema::fixtures::valid_payload;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Scripted provider that records every request it receives.
struct MockProvider {
    id: ProviderId,
    reply: Result<String, LLMError>,
    calls: AtomicUsize,
    seen: Mutex<Vec<LLMRequest>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MockProvider {
    fn replying(id: ProviderId, content: impl Into<String>) -> Self {
        Self {
            id,
            reply: Ok(content.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    fn failing(id: ProviderId, error: LLMError) -> Self {
        Self {
            reply: Err(error),
            ..Self::replying(id, "")
        }
    }

    /// Hold the reply until the returned sender fires
    fn gated(mut self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        self.gate = Mutex::new(Some(rx));
        (self, tx)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LLMProvider for MockProvider {
    fn execute_request(&self, request: LLMRequest) -> BoxFuture<'_, Result<LLMResponse, LLMError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let request_id = request.id;
        self.seen.lock().unwrap().push(request);
        let gate = self.gate.lock().unwrap().take();
        let reply = self.reply.clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let content = reply?;
            Ok(LLMResponse {
                request_id,
                content,
                model_used: "mock-model".to_string(),
                citations: Vec::new(),
                execution_time: Duration::from_millis(10),
                provider_metadata: HashMap::new(),
            })
        })
    }

    fn provider_id(&self) -> ProviderId {
        self.id
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

fn orchestrator() -> AnalysisOrchestrator {
    AnalysisOrchestrator::with_parts(
        SettingsHandle::default(),
        CredentialResolver::with_lookup(|_| None),
        reqwest::Client::new(),
    )
}

fn timing_request(code: &str) -> AnalysisRequest {
    AnalysisRequest::new(AnalysisKind::Timing, Market::CN, code)
}

#[tokio::test]
async fn test_timing_round_trip_through_orchestrator() {
    let orchestrator = orchestrator();
    let surface = SurfaceId::from("timing");
    let provider = MockProvider::replying(
        ProviderId::DeepSeek,
        valid_payload(AnalysisKind::Timing).to_string(),
    );

    let outcome = orchestrator
        .analyze_with(&surface, timing_request("000001"), &provider)
        .await;

    let result = outcome.committed().unwrap().as_ref().unwrap();
    let timing = result.payload().as_timing().unwrap();
    assert_eq!(timing.action, TimingAction::Buy);
    assert_eq!(timing.position_score, 82.0);
    assert_eq!(result.provider_used(), ProviderId::DeepSeek);
    assert_eq!(provider.calls(), 1);

    let seen = provider.seen.lock().unwrap();
    assert!(seen[0].prompt.contains("000001"));
    assert!(seen[0].system_message.is_some());
}

#[tokio::test]
async fn test_empty_input_never_reaches_provider() {
    let orchestrator = orchestrator();
    let provider = MockProvider::replying(ProviderId::Gemini, "{}");

    let outcome = orchestrator
        .analyze_with(&SurfaceId::from("s"), timing_request("  "), &provider)
        .await;

    let error = outcome.committed().unwrap().as_ref().unwrap_err();
    assert_eq!(error.kind, ErrorKind::Validation);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_missing_credential_is_auth_before_network() {
    // Unroutable endpoint: any network attempt would surface as Network, not Auth.
    let mut settings = AppSettings::default();
    settings.providers.insert(
        "deepseek".to_string(),
        crate::config::ProviderSettings {
            base_url: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        },
    );
    let orchestrator = AnalysisOrchestrator::with_parts(
        SettingsHandle::new(settings),
        CredentialResolver::with_lookup(|_| None),
        reqwest::Client::new(),
    );

    let outcome = orchestrator
        .analyze_with_llm(
            &SurfaceId::from("s"),
            timing_request("000001"),
            Some(ProviderId::DeepSeek),
        )
        .await;

    let error = outcome.committed().unwrap().as_ref().unwrap_err();
    assert_eq!(error.kind, ErrorKind::Auth);
    assert_eq!(error.kind.user_action(), UserAction::ConfigureCredentials);
    assert!(error.message.contains("DEEPSEEK_API_KEY"));
}

#[tokio::test]
async fn test_default_provider_comes_from_settings_snapshot() {
    let settings = SettingsHandle::default();
    let mut updated = AppSettings::default();
    updated.default_provider = ProviderId::Qwen;
    settings.replace(updated);

    let orchestrator = AnalysisOrchestrator::with_parts(
        settings,
        CredentialResolver::with_lookup(|_| None),
        reqwest::Client::new(),
    );
    let outcome = orchestrator
        .analyze_with_llm(&SurfaceId::from("s"), timing_request("000001"), None)
        .await;

    let error = outcome.committed().unwrap().as_ref().unwrap_err();
    assert!(error.message.contains("DASHSCOPE_API_KEY"));
}

#[tokio::test]
async fn test_stale_outcome_is_discarded() {
    let orchestrator = orchestrator();
    let surface = SurfaceId::from("timing");

    let (slow, release_slow) = MockProvider::replying(
        ProviderId::Gemini,
        valid_payload(AnalysisKind::Timing).to_string(),
    )
    .gated();
    let mut newer = valid_payload(AnalysisKind::Timing);
    newer["action"] = serde_json::json!("Sell");
    let fast = MockProvider::replying(ProviderId::Qwen, newer.to_string());

    // A is issued first, B second; B completes before A.
    let a = orchestrator.analyze_with(&surface, timing_request("000001"), &slow);
    let b = orchestrator.analyze_with(&surface, timing_request("600519"), &fast);

    let (a_outcome, b_outcome) = tokio::join!(a, async {
        let outcome = b.await;
        let _ = release_slow.send(());
        outcome
    });

    assert!(!b_outcome.is_superseded());
    assert!(matches!(
        a_outcome,
        SurfaceOutcome::Superseded {
            generation: 1,
            current: 2
        }
    ));

    let visible = orchestrator.latest(&surface).unwrap().unwrap();
    assert_eq!(visible.provider_used(), ProviderId::Qwen);
    assert_eq!(
        visible.payload().as_timing().unwrap().action,
        TimingAction::Sell
    );
}

#[tokio::test]
async fn test_surfaces_do_not_supersede_each_other() {
    let orchestrator = orchestrator();
    let provider = MockProvider::replying(
        ProviderId::Gemini,
        valid_payload(AnalysisKind::Timing).to_string(),
    );

    let first = orchestrator.analyze_with(&SurfaceId::from("left"), timing_request("1"), &provider);
    let second =
        orchestrator.analyze_with(&SurfaceId::from("right"), timing_request("2"), &provider);
    let (first, second) = tokio::join!(first, second);

    assert!(!first.is_superseded());
    assert!(!second.is_superseded());
}

#[tokio::test]
async fn test_schema_failure_is_validation_with_raw_content() {
    let orchestrator = orchestrator();
    let mut payload = valid_payload(AnalysisKind::BatchTiming);
    payload["stocks"][1]["capital_flow"] = serde_json::json!("Sideways");
    let raw = payload.to_string();
    let provider = MockProvider::replying(ProviderId::DeepSeek, raw.clone());

    let request = AnalysisRequest::new(AnalysisKind::BatchTiming, Market::CN, "000001 600519");
    let outcome = orchestrator
        .analyze_with(&SurfaceId::from("batch"), request, &provider)
        .await;

    let error = outcome.committed().unwrap().as_ref().unwrap_err();
    assert_eq!(error.kind, ErrorKind::Validation);
    assert!(error.message.contains("stocks[1].capital_flow"));
    assert_eq!(error.raw_content.as_deref(), Some(raw.as_str()));
}

#[tokio::test]
async fn test_provider_errors_are_classified() {
    let orchestrator = orchestrator();
    let cases = [
        (LLMError::Quota("Insufficient Balance".to_string()), ErrorKind::Quota),
        (LLMError::Authentication("bad key".to_string()), ErrorKind::Auth),
        (LLMError::Network("timed out".to_string()), ErrorKind::Network),
    ];

    for (error, expected) in cases {
        let provider = MockProvider::failing(ProviderId::Gemini, error);
        let outcome = orchestrator
            .analyze_with(&SurfaceId::from("s"), timing_request("000001"), &provider)
            .await;
        let classified = outcome.committed().unwrap().as_ref().unwrap_err();
        assert_eq!(classified.kind, expected);
        assert_eq!(provider.calls(), 1);
    }
}

#[tokio::test]
async fn test_image_is_forwarded_to_provider() {
    let orchestrator = orchestrator();
    let provider = MockProvider::replying(
        ProviderId::Gemini,
        valid_payload(AnalysisKind::MarketOverview).to_string(),
    );
    let request = AnalysisRequest::new(AnalysisKind::MarketOverview, Market::CN, "")
        .with_image(ImageInput::new("image/png", "AAAA"));

    let outcome = orchestrator
        .analyze_with(&SurfaceId::from("overview"), request, &provider)
        .await;

    assert!(outcome.committed().unwrap().is_ok());
    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen[0].image.as_ref().unwrap().data, "AAAA");
    assert!(seen[0].prompt.contains("The attached image"));
}

#[tokio::test]
async fn test_text_only_provider_never_sees_image_rules() {
    let orchestrator = orchestrator();
    let provider = MockProvider::replying(
        ProviderId::DeepSeek,
        valid_payload(AnalysisKind::Timing).to_string(),
    );
    let request = timing_request("000001").with_image(ImageInput::new("image/png", "AAAA"));

    let outcome = orchestrator
        .analyze_with(&SurfaceId::from("timing"), request, &provider)
        .await;

    assert!(outcome.committed().unwrap().is_ok());
    let seen = provider.seen.lock().unwrap();
    assert!(seen[0].image.is_none());
    assert!(!seen[0].prompt.contains("The attached image"));
    assert!(seen[0].prompt.contains("Visual data is unavailable"));
}

#[test]
fn test_preview_builds_without_network() {
    let directive = orchestrator()
        .preview(&timing_request("000001"), None)
        .unwrap();
    assert_eq!(directive.kind, AnalysisKind::Timing);
    assert!(directive.prompt.contains("Live web search"));

    let image_request = timing_request("000001").with_image(ImageInput::new("image/png", "AAAA"));
    let directive = orchestrator()
        .preview(&image_request, Some(ProviderId::DeepSeek))
        .unwrap();
    assert!(directive.image.is_none());
    assert!(!directive.prompt.contains("The attached image"));

    let error = orchestrator().preview(&timing_request(""), None).unwrap_err();
    assert_eq!(error.kind, ErrorKind::Validation);
}
