//! Per-kind required-field contracts.
//!
//! A contract is a static tree of [`Field`]s. Validation walks the whole tree
//! and reports every violation it finds; a payload is accepted only when the
//! list is empty.

use crate::analysis::AnalysisKind;
use serde_json::Value;
use std::fmt::Write as _;
use thiserror::Error;

/// Primitive shape a required field must have.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    String,
    Number,
    /// String restricted to a closed set of values
    OneOf(&'static [&'static str]),
    Object(&'static [Field]),
    ArrayOf(&'static FieldType),
}

impl FieldType {
    fn describe(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::OneOf(_) => "a string",
            FieldType::Number => "a number",
            FieldType::Object(_) => "an object",
            FieldType::ArrayOf(_) => "an array",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn field(name: &'static str, ty: FieldType) -> Field {
    Field { name, ty }
}

const STRING: FieldType = FieldType::String;
const NUMBER: FieldType = FieldType::Number;
const STRING_LIST: FieldType = FieldType::ArrayOf(&FieldType::String);

const TIMING_FIELDS: &[Field] = &[
    field("action", FieldType::OneOf(&["Buy", "Wait", "Sell", "Reduce"])),
    field("position_score", NUMBER),
    field("entry_logic", STRING),
    field("entry_price_window", STRING),
    field("stop_loss", STRING),
    field("target_profit", STRING),
    field("kline_analysis", STRING),
];

const BATCH_STOCK_FIELDS: &[Field] = &[
    field("name", STRING),
    field("code", STRING),
    field("win_rate", NUMBER),
    field("verdict", STRING),
    field("verdict_label", STRING),
    field("sector_heat", STRING),
    field("capital_flow", FieldType::OneOf(&["Inflow", "Outflow", "Neutral"])),
    field("technical_score", STRING),
    field("key_price", STRING),
    field("logic_summary", STRING),
];
const BATCH_STOCK: FieldType = FieldType::Object(BATCH_STOCK_FIELDS);

const BATCH_TIMING_FIELDS: &[Field] = &[
    field("market_context", STRING),
    field("overall_risk_score", NUMBER),
    field("stocks", FieldType::ArrayOf(&BATCH_STOCK)),
];

const MARKET_INDEX_FIELDS: &[Field] = &[
    field("name", STRING),
    field("value", STRING),
    field("direction", FieldType::OneOf(&["up", "down"])),
    field("percent", STRING),
];
const MARKET_INDEX: FieldType = FieldType::Object(MARKET_INDEX_FIELDS);

const SENTIMENT_FIELDS: &[Field] = &[field("score", NUMBER), field("summary", STRING)];

const VOLUME_FIELDS: &[Field] = &[
    field("total_volume", STRING),
    field("volume_trend", FieldType::OneOf(&["expansion", "contraction"])),
    field("volume_delta", STRING),
    field("capital_mood", STRING),
];

const MACRO_LOGIC_FIELDS: &[Field] = &[
    field("external_impact", STRING),
    field("policy_focus", STRING),
    field("core_verdict", STRING),
];

const ROTATION_FIELDS: &[Field] = &[
    field("inflow_sectors", STRING_LIST),
    field("outflow_sectors", STRING_LIST),
    field("rotation_logic", STRING),
];

const MARKET_OVERVIEW_FIELDS: &[Field] = &[
    field("data_date", STRING),
    field("market_indices", FieldType::ArrayOf(&MARKET_INDEX)),
    field("market_sentiment", FieldType::Object(SENTIMENT_FIELDS)),
    field("market_volume", FieldType::Object(VOLUME_FIELDS)),
    field("macro_logic", FieldType::Object(MACRO_LOGIC_FIELDS)),
    field("capital_rotation", FieldType::Object(ROTATION_FIELDS)),
];

const SECTOR_FIELDS: &[Field] = &[
    field("name", STRING),
    field("heat_index", NUMBER),
    field("logic", STRING),
    field("catalysts", STRING_LIST),
];
const SECTOR: FieldType = FieldType::Object(SECTOR_FIELDS);

const OUTLOOK_FIELDS: &[Field] = &[
    field("period", STRING),
    field("top_sectors", FieldType::ArrayOf(&SECTOR)),
];

const LOGIC_LINK_FIELDS: &[Field] = &[
    field("event", STRING),
    field("impact", STRING),
    field("result", STRING),
];
const LOGIC_LINK: FieldType = FieldType::Object(LOGIC_LINK_FIELDS);

const STRATEGIC_FIELDS: &[Field] = &[
    field("theme", STRING),
    field("vision", STRING),
    field("potential_winners", STRING_LIST),
    field("key_policy_indicators", STRING_LIST),
];

const MACRO_FORECAST_FIELDS: &[Field] = &[
    field("summary", STRING),
    field("short_term_outlook", FieldType::Object(OUTLOOK_FIELDS)),
    field("logic_chain", FieldType::ArrayOf(&LOGIC_LINK)),
    field("strategic_planning_15th", FieldType::Object(STRATEGIC_FIELDS)),
    field("risk_warning", STRING),
];

const SINGLE_STOCK_FIELDS: &[Field] = &[
    field("stock_name", STRING),
    field("code", STRING),
    field("current_price", STRING),
    field("trend", FieldType::OneOf(&["Bullish", "Bearish", "Sideways"])),
    field("score", NUMBER),
    field("support_level", STRING),
    field("resistance_level", STRING),
    field("fundamental_view", STRING),
    field("technical_view", STRING),
    field("risk_factors", STRING_LIST),
    field("recommendation", STRING),
];

static MARKET_OVERVIEW: SchemaContract = SchemaContract {
    kind: AnalysisKind::MarketOverview,
    fields: MARKET_OVERVIEW_FIELDS,
};
static SINGLE_STOCK: SchemaContract = SchemaContract {
    kind: AnalysisKind::SingleStock,
    fields: SINGLE_STOCK_FIELDS,
};
static TIMING: SchemaContract = SchemaContract {
    kind: AnalysisKind::Timing,
    fields: TIMING_FIELDS,
};
static BATCH_TIMING: SchemaContract = SchemaContract {
    kind: AnalysisKind::BatchTiming,
    fields: BATCH_TIMING_FIELDS,
};
static MACRO_FORECAST: SchemaContract = SchemaContract {
    kind: AnalysisKind::MacroForecast,
    fields: MACRO_FORECAST_FIELDS,
};

/// One reason a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing required field `{path}`")]
    Missing { path: String },

    #[error("field `{path}` must be {expected}, found {found}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field `{path}` must be one of [{allowed}], found {found:?}")]
    NotAllowed {
        path: String,
        allowed: String,
        found: String,
    },
}

impl SchemaViolation {
    pub fn path(&self) -> &str {
        match self {
            SchemaViolation::Missing { path }
            | SchemaViolation::WrongType { path, .. }
            | SchemaViolation::NotAllowed { path, .. } => path,
        }
    }
}

/// Required structure of the payload for one analysis kind.
#[derive(Debug, PartialEq)]
pub struct SchemaContract {
    kind: AnalysisKind,
    fields: &'static [Field],
}

impl SchemaContract {
    pub fn for_kind(kind: AnalysisKind) -> &'static SchemaContract {
        match kind {
            AnalysisKind::MarketOverview => &MARKET_OVERVIEW,
            AnalysisKind::SingleStock => &SINGLE_STOCK,
            AnalysisKind::Timing => &TIMING,
            AnalysisKind::BatchTiming => &BATCH_TIMING,
            AnalysisKind::MacroForecast => &MACRO_FORECAST,
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Check every required field. Returns all violations, never a partial pass.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();
        match value {
            Value::Object(_) => check_object(self.fields, value, "", &mut violations),
            other => violations.push(SchemaViolation::WrongType {
                path: "$".to_string(),
                expected: "an object",
                found: json_type(other),
            }),
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Render the contract as an annotated JSON skeleton for prompts.
    pub fn render_skeleton(&self) -> String {
        let mut out = String::new();
        render_object(self.fields, 0, &mut out);
        out
    }
}

fn check_object(fields: &[Field], value: &Value, prefix: &str, out: &mut Vec<SchemaViolation>) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        match value.get(field.name) {
            None => out.push(SchemaViolation::Missing { path }),
            Some(child) => check_value(&field.ty, child, &path, out),
        }
    }
}

fn check_value(ty: &FieldType, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    match (ty, value) {
        (FieldType::String, Value::String(_)) => {}
        (FieldType::Number, Value::Number(_)) => {}
        (FieldType::OneOf(allowed), Value::String(s)) => {
            if !allowed.contains(&s.as_str()) {
                out.push(SchemaViolation::NotAllowed {
                    path: path.to_string(),
                    allowed: allowed.join(", "),
                    found: s.clone(),
                });
            }
        }
        (FieldType::Object(fields), Value::Object(_)) => check_object(fields, value, path, out),
        (FieldType::ArrayOf(item), Value::Array(items)) => {
            for (i, element) in items.iter().enumerate() {
                check_value(item, element, &format!("{}[{}]", path, i), out);
            }
        }
        (expected, found) => out.push(SchemaViolation::WrongType {
            path: path.to_string(),
            expected: expected.describe(),
            found: json_type(found),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn render_object(fields: &[Field], indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent + 1);
    out.push_str("{\n");
    for (i, field) in fields.iter().enumerate() {
        let _ = write!(out, "{}\"{}\": ", pad, field.name);
        render_type(&field.ty, indent + 1, out);
        if i + 1 < fields.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(&"  ".repeat(indent));
    out.push('}');
}

fn render_type(ty: &FieldType, indent: usize, out: &mut String) {
    match ty {
        FieldType::String => out.push_str("\"string\""),
        FieldType::Number => out.push_str("number"),
        FieldType::OneOf(allowed) => {
            let _ = write!(out, "\"{}\"", allowed.join("\" | \""));
        }
        FieldType::Object(fields) => render_object(fields, indent, out),
        FieldType::ArrayOf(item) => {
            out.push('[');
            render_type(item, indent, out);
            out.push(']');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures;
    use serde_json::json;

    #[test]
    fn test_every_fixture_satisfies_its_contract() {
        for kind in AnalysisKind::ALL {
            let contract = SchemaContract::for_kind(kind);
            assert_eq!(contract.kind(), kind);
            assert_eq!(contract.validate(&fixtures::valid_payload(kind)), Ok(()));
        }
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let mut payload = fixtures::valid_payload(AnalysisKind::Timing);
        payload.as_object_mut().unwrap().remove("stop_loss");

        let violations = SchemaContract::for_kind(AnalysisKind::Timing)
            .validate(&payload)
            .unwrap_err();
        assert_eq!(
            violations,
            vec![SchemaViolation::Missing {
                path: "stop_loss".to_string()
            }]
        );
    }

    #[test]
    fn test_all_violations_are_reported() {
        let payload = json!({
            "action": "Hold",
            "position_score": "82",
            "entry_logic": "breakout",
            "entry_price_window": "12.1-12.4",
            "target_profit": null,
            "kline_analysis": "ok"
        });

        let violations = SchemaContract::for_kind(AnalysisKind::Timing)
            .validate(&payload)
            .unwrap_err();
        let paths: Vec<&str> = violations.iter().map(|v| v.path()).collect();
        assert_eq!(
            paths,
            vec!["action", "position_score", "stop_loss", "target_profit"]
        );
    }

    #[test]
    fn test_nested_array_items_are_checked() {
        let mut payload = fixtures::valid_payload(AnalysisKind::BatchTiming);
        payload["stocks"][1]["capital_flow"] = json!("Sideways");
        payload["stocks"][1]
            .as_object_mut()
            .unwrap()
            .remove("key_price");

        let violations = SchemaContract::for_kind(AnalysisKind::BatchTiming)
            .validate(&payload)
            .unwrap_err();
        let paths: Vec<&str> = violations.iter().map(|v| v.path()).collect();
        assert_eq!(paths, vec!["stocks[1].capital_flow", "stocks[1].key_price"]);
    }

    #[test]
    fn test_string_list_rejects_non_strings() {
        let mut payload = fixtures::valid_payload(AnalysisKind::MarketOverview);
        payload["capital_rotation"]["inflow_sectors"] = json!(["Semiconductors", 3]);

        let violations = SchemaContract::for_kind(AnalysisKind::MarketOverview)
            .validate(&payload)
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path(), "capital_rotation.inflow_sectors[1]");
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        let violations = SchemaContract::for_kind(AnalysisKind::MacroForecast)
            .validate(&json!(["not", "an", "object"]))
            .unwrap_err();
        assert_eq!(violations[0].path(), "$");
    }

    #[test]
    fn test_skeleton_lists_every_top_level_field() {
        for kind in AnalysisKind::ALL {
            let contract = SchemaContract::for_kind(kind);
            let skeleton = contract.render_skeleton();
            for field in contract.fields() {
                assert!(
                    skeleton.contains(&format!("\"{}\":", field.name)),
                    "{} skeleton missing {}",
                    kind,
                    field.name
                );
            }
        }

        let timing = SchemaContract::for_kind(AnalysisKind::Timing).render_skeleton();
        assert!(timing.contains("\"Buy\" | \"Wait\" | \"Sell\" | \"Reduce\""));
        assert!(timing.contains("\"position_score\": number"));
    }
}
