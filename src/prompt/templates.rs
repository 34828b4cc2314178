//! Kind-specific task instructions.

use crate::analysis::{AnalysisKind, Market, Period};

pub const SYSTEM_MESSAGE: &str = "You are a senior buy-side market strategist. \
You answer with a single JSON object and nothing else. \
Every number you report must be traceable to the data sources you are given.";

/// Task paragraph for one analysis kind.
pub fn task_instructions(
    kind: AnalysisKind,
    market: Market,
    period: Option<Period>,
    subject: &str,
) -> String {
    let horizon = period.unwrap_or(Period::Day).horizon();

    match kind {
        AnalysisKind::MarketOverview => format!(
            "Produce a market overview for {market}. Report the latest close and change of {indices}. \
             Assess overall sentiment on a 0-100 scale, turnover versus the previous session, \
             the macro drivers behind today's move and where capital is rotating. \
             Focus on {horizon}.{extra}",
            market = market.description(),
            indices = market.benchmarks().join(", "),
            horizon = horizon,
            extra = optional_focus(subject),
        ),
        AnalysisKind::SingleStock => format!(
            "Diagnose the stock \"{subject}\" listed in {market}. Identify the company name and code, \
             the current price, the prevailing trend, key support and resistance levels, \
             the fundamental and technical picture and the main risks. \
             Score the setup from 0 to 100 and close with a concrete recommendation for {horizon}.",
            market = market.description(),
        ),
        AnalysisKind::Timing => format!(
            "Give an entry and exit timing signal for \"{subject}\" in {market} over {horizon}. \
             Choose one action (Buy, Wait, Sell or Reduce), score the position from 0 to 100, \
             explain the entry logic, give an entry price window, a stop loss and a profit target, \
             and summarise what the candlestick structure shows.",
            market = market.description(),
        ),
        AnalysisKind::BatchTiming => format!(
            "Score each of the following tickers in {market} for {horizon}: {subject}. \
             Return exactly one entry per ticker in the order given. For each, estimate a win rate \
             in percent, a short verdict with a display label, sector heat, the direction of capital flow, \
             a technical grade, the key price to watch and a one-line rationale. \
             Also describe the shared market context and an overall risk score from 0 to 100.",
            market = market.description(),
        ),
        AnalysisKind::MacroForecast => format!(
            "Forecast the macro and sector landscape for {market}. \
             For {horizon}, name the sectors most likely to lead with a 0-100 heat index, \
             their logic and upcoming catalysts. Lay out the causal chain from current events \
             to market outcomes. Then map the long-range opportunity set implied by the \
             15th Five-Year Plan (2026-2030): its central theme, the policy vision, likely \
             beneficiaries and the indicators to track. Finish with the main risk.{extra}",
            market = market.description(),
            extra = optional_focus(subject),
        ),
    }
}

fn optional_focus(subject: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        String::new()
    } else {
        format!(" Pay particular attention to: {}.", subject)
    }
}
