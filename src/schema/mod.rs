pub mod contract;
pub mod payload;

pub use contract::{Field, FieldType, SchemaContract, SchemaViolation};
pub use payload::*;

/// Well-formed payloads for each kind, shared by unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::analysis::AnalysisKind;
    use serde_json::{Value, json};

    pub fn valid_payload(kind: AnalysisKind) -> Value {
        match kind {
            AnalysisKind::Timing => json!({
                "action": "Buy",
                "position_score": 82,
                "entry_logic": "Pullback to the 20-day line on shrinking volume",
                "entry_price_window": "12.1-12.4",
                "stop_loss": "11.8",
                "target_profit": "13.5",
                "kline_analysis": "Higher lows since the March bottom"
            }),
            AnalysisKind::BatchTiming => json!({
                "market_context": "Index consolidating below resistance",
                "overall_risk_score": 45,
                "stocks": [
                    {
                        "name": "Ping An Bank",
                        "code": "000001",
                        "win_rate": 62.5,
                        "verdict": "accumulate",
                        "verdict_label": "Accumulate",
                        "sector_heat": "warm",
                        "capital_flow": "Inflow",
                        "technical_score": "B+",
                        "key_price": "12.10",
                        "logic_summary": "Dividend support with improving margins"
                    },
                    {
                        "name": "Kweichow Moutai",
                        "code": "600519",
                        "win_rate": 48,
                        "verdict": "wait",
                        "verdict_label": "Wait",
                        "sector_heat": "cool",
                        "capital_flow": "Outflow",
                        "technical_score": "C",
                        "key_price": "1500",
                        "logic_summary": "Consumption data still soft"
                    }
                ]
            }),
            AnalysisKind::MarketOverview => json!({
                "data_date": "2026-10-16",
                "market_indices": [
                    {"name": "SSE Composite", "value": "3312.5", "direction": "up", "percent": "+0.82%"},
                    {"name": "ChiNext Index", "value": "2180.1", "direction": "down", "percent": "-0.35%"}
                ],
                "market_sentiment": {"score": 64, "summary": "Cautiously constructive"},
                "market_volume": {
                    "total_volume": "1.05 trillion CNY",
                    "volume_trend": "expansion",
                    "volume_delta": "+8%",
                    "capital_mood": "Risk appetite improving"
                },
                "macro_logic": {
                    "external_impact": "Softer dollar",
                    "policy_focus": "Consumption support",
                    "core_verdict": "Range trade with upward bias"
                },
                "capital_rotation": {
                    "inflow_sectors": ["Semiconductors", "Brokerages"],
                    "outflow_sectors": ["Coal"],
                    "rotation_logic": "Rotation from defensives into beta"
                }
            }),
            AnalysisKind::MacroForecast => json!({
                "summary": "Policy easing cycle continues",
                "short_term_outlook": {
                    "period": "Next 4 weeks",
                    "top_sectors": [
                        {"name": "Computing power", "heat_index": 88, "logic": "Capex upcycle", "catalysts": ["Model launches"]}
                    ]
                },
                "logic_chain": [
                    {"event": "Rate cut", "impact": "Lower funding cost", "result": "Valuation support"}
                ],
                "strategic_planning_15th": {
                    "theme": "New quality productive forces",
                    "vision": "Technology self-reliance",
                    "potential_winners": ["Advanced manufacturing"],
                    "key_policy_indicators": ["R&D intensity"]
                },
                "risk_warning": "External demand slowdown"
            }),
            AnalysisKind::SingleStock => json!({
                "stock_name": "Ping An Bank",
                "code": "000001",
                "current_price": "12.25",
                "trend": "Bullish",
                "score": 71,
                "support_level": "11.80",
                "resistance_level": "13.20",
                "fundamental_view": "Asset quality stabilising",
                "technical_view": "Above all major moving averages",
                "risk_factors": ["Net interest margin pressure"],
                "recommendation": "Hold with a trailing stop"
            }),
        }
    }
}
