//! Fits a request to what the selected backend can actually do.

use crate::llm::types::{LLMRequest, ProviderCapabilities};
use tracing::warn;

pub const VISION_UNAVAILABLE_NOTE: &str = "Note: an image was supplied but this model cannot read images. \
Visual data is unavailable; do not describe the image and rely on the text and the other sources only.";

pub const SEARCH_UNAVAILABLE_NOTE: &str = "Note: live web search is not available to you. \
Rely on the data supplied here and your own knowledge, and state the date of the data you use in the report.";

/// A request after capability negotiation, ready for a strategy to encode.
#[derive(Debug, Clone)]
pub struct NegotiatedRequest {
    pub request: LLMRequest,
    /// Attach the web-search grounding tool
    pub use_grounding: bool,
    /// Ask the backend for a JSON-only response format
    pub force_json: bool,
    pub image_dropped: bool,
}

/// Degrade a request to the backend's capability set. Never fails.
pub fn negotiate(mut request: LLMRequest, caps: ProviderCapabilities) -> NegotiatedRequest {
    let mut image_dropped = false;

    if request.image.is_some() && !caps.supports_vision {
        warn!("Provider has no vision support; dropping attached image");
        request.image = None;
        image_dropped = true;
        append_note(&mut request.prompt, VISION_UNAVAILABLE_NOTE);
    }

    if !caps.supports_web_search {
        append_note(&mut request.prompt, SEARCH_UNAVAILABLE_NOTE);
    }

    NegotiatedRequest {
        request,
        use_grounding: caps.supports_web_search,
        force_json: caps.supports_forced_json,
        image_dropped,
    }
}

fn append_note(prompt: &mut String, note: &str) {
    if !prompt.ends_with('\n') && !prompt.is_empty() {
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(note);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ImageInput;
    use crate::llm::ProviderId;

    fn request_with_image() -> LLMRequest {
        LLMRequest {
            prompt: "Analyse the chart".to_string(),
            image: Some(ImageInput::new("image/png", "AAAA")),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_dropped_for_text_only_backend() {
        let negotiated = negotiate(request_with_image(), ProviderId::DeepSeek.capabilities());

        assert!(negotiated.image_dropped);
        assert!(negotiated.request.image.is_none());
        assert!(negotiated.request.prompt.contains(VISION_UNAVAILABLE_NOTE));
        assert!(negotiated.request.prompt.contains(SEARCH_UNAVAILABLE_NOTE));
        assert!(negotiated.force_json);
        assert!(!negotiated.use_grounding);
    }

    #[test]
    fn test_vision_backend_keeps_image() {
        let negotiated = negotiate(request_with_image(), ProviderId::Qwen.capabilities());

        assert!(!negotiated.image_dropped);
        assert!(negotiated.request.image.is_some());
        assert!(!negotiated.request.prompt.contains(VISION_UNAVAILABLE_NOTE));
        assert!(!negotiated.force_json);
    }

    #[test]
    fn test_grounded_backend_gets_no_search_note() {
        let negotiated = negotiate(request_with_image(), ProviderId::Gemini.capabilities());

        assert!(negotiated.use_grounding);
        assert_eq!(negotiated.request.prompt, "Analyse the chart");
    }
}
