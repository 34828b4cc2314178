use super::templates;
use crate::analysis::{AnalysisKind, AnalysisRequest, ImageInput};
use crate::llm::ProviderCapabilities;
use crate::schema::SchemaContract;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("Nothing to analyse: the query is empty and no image is attached")]
    EmptyInput,
    #[error("No ticker codes found in '{0}'")]
    EmptyTickerList(String),
}

/// Fully composed instructions for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDirective {
    pub kind: AnalysisKind,
    pub system_message: String,
    pub prompt: String,
    pub image: Option<ImageInput>,
}

/// Turns an [`AnalysisRequest`] into a [`PromptDirective`].
///
/// The directive always carries four sections: the task, the request
/// context, the data-priority rule and the JSON output contract. It is
/// written for the target backend: an image the backend cannot read is left
/// out, and so are the rules that depend on it or on web search.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    reference_date: Option<NaiveDate>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the date written into the context section. Defaults to today (UTC).
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn build(
        &self,
        request: &AnalysisRequest,
        caps: ProviderCapabilities,
    ) -> Result<PromptDirective, PromptError> {
        let query = request.query.trim();
        if query.is_empty() && request.image.is_none() {
            return Err(PromptError::EmptyInput);
        }

        let sources = Sources {
            image: request.image.as_ref().filter(|_| caps.supports_vision),
            image_dropped: request.image.is_some() && !caps.supports_vision,
            price_anchor: request.price_anchor.as_deref().map(str::trim),
            web_search: caps.supports_web_search,
        };

        let subject = match request.kind {
            AnalysisKind::BatchTiming if !query.is_empty() => {
                let tickers = parse_ticker_list(query);
                if tickers.is_empty() {
                    return Err(PromptError::EmptyTickerList(query.to_string()));
                }
                tickers.join(", ")
            }
            AnalysisKind::SingleStock | AnalysisKind::Timing | AnalysisKind::BatchTiming
                if query.is_empty() =>
            {
                if sources.image.is_some() {
                    "the security shown in the attached screenshot".to_string()
                } else {
                    "an unidentified security (no ticker was given and the user's screenshot \
                     could not be read). Say that it could not be identified instead of guessing"
                        .to_string()
                }
            }
            _ => query.to_string(),
        };

        let contract = SchemaContract::for_kind(request.kind);
        let mut prompt = String::new();

        prompt.push_str("## Task\n");
        prompt.push_str(&templates::task_instructions(
            request.kind,
            request.market,
            request.period,
            &subject,
        ));
        prompt.push_str("\n\n");

        self.write_context(&mut prompt, request, &sources);
        write_data_priority(&mut prompt, &sources);

        prompt.push_str("## Output format\n");
        prompt.push_str(
            "Respond with JSON only: a single object, no markdown fences, no commentary before or after it. \
             Use exactly these keys. Every key is required and enumerated values must be copied verbatim:\n",
        );
        prompt.push_str(&contract.render_skeleton());
        prompt.push('\n');

        debug!(
            kind = %request.kind,
            prompt_chars = prompt.len(),
            has_image = sources.image.is_some(),
            image_dropped = sources.image_dropped,
            "Built prompt directive"
        );

        Ok(PromptDirective {
            kind: request.kind,
            system_message: templates::SYSTEM_MESSAGE.to_string(),
            prompt,
            image: sources.image.cloned(),
        })
    }

    fn write_context(
        &self,
        prompt: &mut String,
        request: &AnalysisRequest,
        sources: &Sources<'_>,
    ) {
        let date = self
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());

        prompt.push_str("## Context\n");
        let _ = writeln!(
            prompt,
            "- Market: {} ({})",
            request.market,
            request.market.description()
        );
        let _ = writeln!(prompt, "- Today's date: {}", date.format("%Y-%m-%d"));
        if let Some(period) = request.period {
            let _ = writeln!(prompt, "- Horizon: {}", period.horizon());
        }
        if let Some(anchor) = sources.price_anchor {
            let _ = writeln!(prompt, "- User-reported current price: {}", anchor);
        }
        if sources.image.is_some() {
            prompt.push_str("- A screenshot of a quote or chart is attached.\n");
        } else if sources.image_dropped {
            prompt.push_str(
                "- The user took a screenshot, but you cannot read images. \
                 Visual data is unavailable; do not guess what it shows.\n",
            );
        }
        prompt.push('\n');
    }
}

/// Data sources the target backend will actually receive.
struct Sources<'a> {
    image: Option<&'a ImageInput>,
    image_dropped: bool,
    price_anchor: Option<&'a str>,
    web_search: bool,
}

fn write_data_priority(prompt: &mut String, sources: &Sources<'_>) {
    prompt.push_str("## Data priority\n");
    prompt.push_str("When sources disagree, trust them in this order:\n");

    let mut rules = Vec::new();
    if sources.image.is_some() {
        let superseded = if sources.web_search {
            "any figure found through web search, which may lag real-time quotes"
        } else {
            "any figure from other sources, including your own knowledge"
        };
        rules.push(format!(
            "The attached image. Prices, index levels and percentages visible on it are authoritative \
             and supersede {superseded}."
        ));
    }
    if sources.price_anchor.is_some() {
        rules.push(
            "The user-reported current price. Anchor every price level you give to it.".to_string(),
        );
    }
    if sources.web_search {
        rules.push(
            "Live web search results, preferring the most recent trading session.".to_string(),
        );
    }
    rules.push(
        "Your own background knowledge, only to fill gaps. State the date of any figure taken from it."
            .to_string(),
    );

    for (rank, rule) in rules.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", rank + 1, rule);
    }
    prompt.push('\n');
}

/// Split a free-form ticker list on whitespace, ASCII or full-width commas
/// and semicolons, and the ideographic enumeration comma.
///
/// Duplicates are dropped; first occurrence wins.
pub fn parse_ticker_list(input: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for token in input
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '，' | '；' | '、'))
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        let token = token.to_uppercase();
        if !tickers.contains(&token) {
            tickers.push(token);
        }
    }
    tickers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Market, Period};
    use crate::llm::ProviderId;

    fn gemini() -> ProviderCapabilities {
        ProviderId::Gemini.capabilities()
    }

    fn builder() -> PromptBuilder {
        PromptBuilder::new()
            .with_reference_date(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
    }

    #[test]
    fn test_empty_query_without_image_is_refused() {
        let request = AnalysisRequest::new(AnalysisKind::Timing, Market::CN, "   ");
        assert_eq!(builder().build(&request, gemini()), Err(PromptError::EmptyInput));
    }

    #[test]
    fn test_image_only_request_is_accepted() {
        let request = AnalysisRequest::new(AnalysisKind::Timing, Market::CN, "")
            .with_image(ImageInput::new("image/png", "AAAA"));
        let directive = builder().build(&request, gemini()).unwrap();
        assert!(directive.prompt.contains("attached screenshot"));
        assert!(directive.image.is_some());
    }

    #[test]
    fn test_visual_precedence_is_stated_with_image() {
        let request = AnalysisRequest::new(AnalysisKind::MarketOverview, Market::CN, "today")
            .with_image(ImageInput::new("image/png", "AAAA"))
            .with_price_anchor("3312.5");
        let directive = builder().build(&request, gemini()).unwrap();

        let prompt = &directive.prompt;
        let image_rule = prompt.find("1. The attached image").unwrap();
        let anchor_rule = prompt.find("2. The user-reported current price").unwrap();
        let search_rule = prompt.find("3. Live web search").unwrap();
        assert!(image_rule < anchor_rule && anchor_rule < search_rule);
        assert!(prompt.contains("supersede any figure found through web search"));
    }

    #[test]
    fn test_text_only_backend_gets_no_image_rules() {
        let request = AnalysisRequest::new(AnalysisKind::Timing, Market::CN, "000001")
            .with_image(ImageInput::new("image/png", "AAAA"))
            .with_price_anchor("12.3");
        let directive = builder()
            .build(&request, ProviderId::DeepSeek.capabilities())
            .unwrap();

        let prompt = &directive.prompt;
        assert!(directive.image.is_none());
        assert!(!prompt.contains("The attached image"));
        assert!(!prompt.contains("A screenshot of a quote or chart is attached"));
        assert!(!prompt.contains("Live web search"));
        assert!(prompt.contains("Visual data is unavailable"));
        assert!(prompt.contains("1. The user-reported current price"));
        assert!(prompt.contains("2. Your own background knowledge"));
    }

    #[test]
    fn test_image_only_request_on_text_only_backend_names_no_screenshot_subject() {
        let request = AnalysisRequest::new(AnalysisKind::Timing, Market::CN, "")
            .with_image(ImageInput::new("image/png", "AAAA"));
        let directive = builder()
            .build(&request, ProviderId::DeepSeek.capabilities())
            .unwrap();

        assert!(!directive.prompt.contains("shown in the attached screenshot"));
        assert!(directive.prompt.contains("could not be identified"));
    }

    #[test]
    fn test_vision_without_search_keeps_image_precedence() {
        let request = AnalysisRequest::new(AnalysisKind::MarketOverview, Market::HK, "today")
            .with_image(ImageInput::new("image/png", "AAAA"));
        let directive = builder()
            .build(&request, ProviderId::Qwen.capabilities())
            .unwrap();

        let prompt = &directive.prompt;
        assert!(directive.image.is_some());
        assert!(prompt.contains("1. The attached image"));
        assert!(prompt.contains("including your own knowledge"));
        assert!(!prompt.contains("Live web search"));
    }

    #[test]
    fn test_without_image_search_is_first_priority() {
        let request = AnalysisRequest::new(AnalysisKind::SingleStock, Market::US, "AAPL");
        let directive = builder().build(&request, gemini()).unwrap();
        assert!(directive.prompt.contains("1. Live web search"));
        assert!(!directive.prompt.contains("The attached image"));
    }

    #[test]
    fn test_context_folds_in_market_period_and_date() {
        let request = AnalysisRequest::new(AnalysisKind::Timing, Market::HK, "00700")
            .with_period(Period::Month)
            .with_price_anchor("412.4");
        let directive = builder().build(&request, gemini()).unwrap();

        assert!(directive.prompt.contains("- Market: HK"));
        assert!(directive.prompt.contains("- Today's date: 2026-10-16"));
        assert!(directive.prompt.contains("- Horizon: the coming month"));
        assert!(directive.prompt.contains("- User-reported current price: 412.4"));
    }

    #[test]
    fn test_output_section_embeds_schema_skeleton() {
        let request = AnalysisRequest::new(AnalysisKind::Timing, Market::CN, "000001");
        let directive = builder().build(&request, gemini()).unwrap();
        let skeleton = SchemaContract::for_kind(AnalysisKind::Timing).render_skeleton();

        assert!(directive.prompt.contains("Respond with JSON only"));
        assert!(directive.prompt.contains(&skeleton));
        assert_eq!(directive.system_message, templates::SYSTEM_MESSAGE);
    }

    #[test]
    fn test_ticker_list_parsing() {
        assert_eq!(
            parse_ticker_list("000001, 600519；00700 、aapl\n000001"),
            vec!["000001", "600519", "00700", "AAPL"]
        );
        assert!(parse_ticker_list(" ,; ").is_empty());
    }

    #[test]
    fn test_batch_rejects_separator_only_query() {
        let request = AnalysisRequest::new(AnalysisKind::BatchTiming, Market::CN, ",,;");
        assert!(matches!(
            builder().build(&request, gemini()),
            Err(PromptError::EmptyTickerList(_))
        ));
    }

    #[test]
    fn test_batch_lists_normalised_tickers() {
        let request =
            AnalysisRequest::new(AnalysisKind::BatchTiming, Market::CN, "600519 000001,600519");
        let directive = builder().build(&request, gemini()).unwrap();
        assert!(directive.prompt.contains("600519, 000001"));
    }
}
