use crate::llm::ProviderId;
use crate::schema::StructuredPayload;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Closed set of structured analyses the system can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    MarketOverview,
    SingleStock,
    Timing,
    BatchTiming,
    MacroForecast,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::MarketOverview,
        AnalysisKind::SingleStock,
        AnalysisKind::Timing,
        AnalysisKind::BatchTiming,
        AnalysisKind::MacroForecast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::MarketOverview => "market_overview",
            AnalysisKind::SingleStock => "single_stock",
            AnalysisKind::Timing => "timing",
            AnalysisKind::BatchTiming => "batch_timing",
            AnalysisKind::MacroForecast => "macro_forecast",
        }
    }

    /// Key under which the payload appears in the result envelope.
    pub fn envelope_key(&self) -> &'static str {
        match self {
            AnalysisKind::MarketOverview => "marketOverviewData",
            AnalysisKind::SingleStock => "singleStockData",
            AnalysisKind::Timing => "timingData",
            AnalysisKind::BatchTiming => "batchTimingData",
            AnalysisKind::MacroForecast => "macroForecastData",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "market_overview" | "overview" | "market" => Ok(AnalysisKind::MarketOverview),
            "single_stock" | "stock" => Ok(AnalysisKind::SingleStock),
            "timing" => Ok(AnalysisKind::Timing),
            "batch_timing" | "batch" => Ok(AnalysisKind::BatchTiming),
            "macro_forecast" | "macro" => Ok(AnalysisKind::MacroForecast),
            other => Err(format!(
                "unknown analysis kind '{}'. Expected one of: market-overview, single-stock, timing, batch-timing, macro-forecast",
                other
            )),
        }
    }
}

/// Market scope of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Market {
    #[default]
    CN,
    HK,
    US,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::CN => "CN",
            Market::HK => "HK",
            Market::US => "US",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Market::CN => "China A-shares (Shanghai and Shenzhen exchanges)",
            Market::HK => "Hong Kong stocks (HKEX)",
            Market::US => "US equities (NYSE and NASDAQ)",
        }
    }

    /// Benchmark indices the market overview is expected to report.
    pub fn benchmarks(&self) -> &'static [&'static str] {
        match self {
            Market::CN => &["SSE Composite", "SZSE Component", "ChiNext Index"],
            Market::HK => &["Hang Seng Index", "Hang Seng TECH", "Hang Seng China Enterprises"],
            Market::US => &["S&P 500", "Nasdaq Composite", "Dow Jones Industrial Average"],
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CN" | "A" | "ASHARE" => Ok(Market::CN),
            "HK" => Ok(Market::HK),
            "US" => Ok(Market::US),
            other => Err(format!("unknown market '{}'. Expected CN, HK or US", other)),
        }
    }
}

/// Requested time horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Month,
}

impl Period {
    pub fn horizon(&self) -> &'static str {
        match self {
            Period::Day => "the current trading session and the next few sessions",
            Period::Month => "the coming month",
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "d" | "daily" => Ok(Period::Day),
            "month" | "m" | "monthly" => Ok(Period::Month),
            other => Err(format!("unknown period '{}'. Expected day or month", other)),
        }
    }
}

/// A single raster image attached to a request.
///
/// `data` is base64 without any `data:<mime>;base64,` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub mime_type: String,
    pub data: String,
}

impl ImageInput {
    /// Create an image input, stripping a data-URI prefix if one was supplied.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        let data = data.into();
        match Self::from_data_uri(&data) {
            Some(parsed) => parsed,
            None => Self {
                mime_type: mime_type.into(),
                data,
            },
        }
    }

    /// Parse `data:<mime>;base64,<payload>`.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        Some(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    /// Read and encode an image file. The MIME type is fixed from the extension.
    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        let mime_type = mime_for_path(path).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unsupported image type: {}", path.display()),
            )
        })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        })
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// One user intent to analyse. Owned by the call that issues it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub kind: AnalysisKind,
    pub market: Market,
    pub period: Option<Period>,
    /// Free text, a ticker, or a ticker list for batch timing
    pub query: String,
    /// User-reported current price used to counter stale search data
    pub price_anchor: Option<String>,
    pub image: Option<ImageInput>,
}

impl AnalysisRequest {
    pub fn new(kind: AnalysisKind, market: Market, query: impl Into<String>) -> Self {
        Self {
            kind,
            market,
            period: None,
            query: query.into(),
            price_anchor: None,
            image: None,
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_price_anchor(mut self, anchor: impl Into<String>) -> Self {
        let anchor = anchor.into();
        self.price_anchor = (!anchor.trim().is_empty()).then_some(anchor);
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }
}

/// A citation backing a web-search grounded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Validated, provider-agnostic outcome of one successful invocation.
///
/// Immutable once built; the payload variant always matches the requested kind.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    id: Uuid,
    raw_content: String,
    payload: StructuredPayload,
    grounding_sources: Vec<GroundingSource>,
    timestamp: DateTime<Utc>,
    elapsed: Duration,
    provider_used: ProviderId,
    model: String,
    market: Market,
}

impl AnalysisResult {
    pub(crate) fn new(
        raw_content: String,
        payload: StructuredPayload,
        grounding_sources: Vec<GroundingSource>,
        elapsed: Duration,
        provider_used: ProviderId,
        model: String,
        market: Market,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_content,
            payload,
            grounding_sources,
            timestamp: Utc::now(),
            elapsed,
            provider_used,
            model,
            market,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> AnalysisKind {
        self.payload.kind()
    }

    pub fn raw_content(&self) -> &str {
        &self.raw_content
    }

    pub fn payload(&self) -> &StructuredPayload {
        &self.payload
    }

    pub fn grounding_sources(&self) -> &[GroundingSource] {
        &self.grounding_sources
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Wall time spent waiting on the provider
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn provider_used(&self) -> ProviderId {
        self.provider_used
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn envelope(&self) -> ResultEnvelope<'_> {
        ResultEnvelope {
            content: &self.raw_content,
            timestamp: self.timestamp.timestamp_millis(),
            model_used: self.provider_used.as_str(),
            is_structured: true,
            payload: &self.payload,
            market: self.market,
            grounding_source: &self.grounding_sources,
        }
    }
}

/// Wire shape handed to renderers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope<'a> {
    pub content: &'a str,
    pub timestamp: i64,
    pub model_used: &'a str,
    pub is_structured: bool,
    #[serde(flatten)]
    pub payload: &'a StructuredPayload,
    pub market: Market,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub grounding_source: &'a [GroundingSource],
}
