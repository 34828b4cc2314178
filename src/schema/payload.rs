//! Typed structured payloads, one per analysis kind.
//!
//! These are read from provider JSON only after the [`SchemaContract`] check
//! has passed, so every field here is required.
//!
//! [`SchemaContract`]: super::SchemaContract

use crate::analysis::AnalysisKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingAction {
    Buy,
    Wait,
    Sell,
    Reduce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingData {
    pub action: TimingAction,
    pub position_score: f64,
    pub entry_logic: String,
    pub entry_price_window: String,
    pub stop_loss: String,
    pub target_profit: String,
    pub kline_analysis: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapitalFlow {
    Inflow,
    Outflow,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStock {
    pub name: String,
    pub code: String,
    pub win_rate: f64,
    pub verdict: String,
    pub verdict_label: String,
    pub sector_heat: String,
    pub capital_flow: CapitalFlow,
    pub technical_score: String,
    pub key_price: String,
    pub logic_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTimingData {
    pub market_context: String,
    pub overall_risk_score: f64,
    pub stocks: Vec<BatchStock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndex {
    pub name: String,
    pub value: String,
    pub direction: Direction,
    pub percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSentiment {
    pub score: f64,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Expansion,
    Contraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketVolume {
    pub total_volume: String,
    pub volume_trend: VolumeTrend,
    pub volume_delta: String,
    pub capital_mood: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroLogic {
    pub external_impact: String,
    pub policy_focus: String,
    pub core_verdict: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalRotation {
    pub inflow_sectors: Vec<String>,
    pub outflow_sectors: Vec<String>,
    pub rotation_logic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverviewData {
    pub data_date: String,
    pub market_indices: Vec<MarketIndex>,
    pub market_sentiment: MarketSentiment,
    pub market_volume: MarketVolume,
    pub macro_logic: MacroLogic,
    pub capital_rotation: CapitalRotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorOutlook {
    pub name: String,
    pub heat_index: f64,
    pub logic: String,
    pub catalysts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermOutlook {
    pub period: String,
    pub top_sectors: Vec<SectorOutlook>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicLink {
    pub event: String,
    pub impact: String,
    pub result: String,
}

/// Long-range themes keyed to the 15th Five-Year Plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicPlanning {
    pub theme: String,
    pub vision: String,
    pub potential_winners: Vec<String>,
    pub key_policy_indicators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroForecastData {
    pub summary: String,
    pub short_term_outlook: ShortTermOutlook,
    pub logic_chain: Vec<LogicLink>,
    pub strategic_planning_15th: StrategicPlanning,
    pub risk_warning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDiagnosisData {
    pub stock_name: String,
    pub code: String,
    pub current_price: String,
    pub trend: Trend,
    pub score: f64,
    pub support_level: String,
    pub resistance_level: String,
    pub fundamental_view: String,
    pub technical_view: String,
    pub risk_factors: Vec<String>,
    pub recommendation: String,
}

/// Exactly one populated variant per result, tagged by analysis kind.
///
/// Serializes externally tagged under the envelope key (`timingData`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructuredPayload {
    #[serde(rename = "marketOverviewData")]
    MarketOverview(MarketOverviewData),
    #[serde(rename = "singleStockData")]
    SingleStock(StockDiagnosisData),
    #[serde(rename = "timingData")]
    Timing(TimingData),
    #[serde(rename = "batchTimingData")]
    BatchTiming(BatchTimingData),
    #[serde(rename = "macroForecastData")]
    MacroForecast(MacroForecastData),
}

impl StructuredPayload {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            StructuredPayload::MarketOverview(_) => AnalysisKind::MarketOverview,
            StructuredPayload::SingleStock(_) => AnalysisKind::SingleStock,
            StructuredPayload::Timing(_) => AnalysisKind::Timing,
            StructuredPayload::BatchTiming(_) => AnalysisKind::BatchTiming,
            StructuredPayload::MacroForecast(_) => AnalysisKind::MacroForecast,
        }
    }

    /// Read a validated JSON object as the payload for `kind`.
    pub fn from_value(
        kind: AnalysisKind,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            AnalysisKind::MarketOverview => {
                StructuredPayload::MarketOverview(serde_json::from_value(value)?)
            }
            AnalysisKind::SingleStock => {
                StructuredPayload::SingleStock(serde_json::from_value(value)?)
            }
            AnalysisKind::Timing => StructuredPayload::Timing(serde_json::from_value(value)?),
            AnalysisKind::BatchTiming => {
                StructuredPayload::BatchTiming(serde_json::from_value(value)?)
            }
            AnalysisKind::MacroForecast => {
                StructuredPayload::MacroForecast(serde_json::from_value(value)?)
            }
        })
    }

    pub fn as_timing(&self) -> Option<&TimingData> {
        match self {
            StructuredPayload::Timing(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_batch_timing(&self) -> Option<&BatchTimingData> {
        match self {
            StructuredPayload::BatchTiming(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_market_overview(&self) -> Option<&MarketOverviewData> {
        match self {
            StructuredPayload::MarketOverview(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_macro_forecast(&self) -> Option<&MacroForecastData> {
        match self {
            StructuredPayload::MacroForecast(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_single_stock(&self) -> Option<&StockDiagnosisData> {
        match self {
            StructuredPayload::SingleStock(data) => Some(data),
            _ => None,
        }
    }
}
