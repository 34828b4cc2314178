//! Command line argument parsing
//!
//! Subcommands:
//! - `analyze`: Run one structured analysis and print the result envelope
//! - `providers`: List providers, capabilities and credential sources
//! - `set-key`: Save a provider API key to the settings file
//! - `show-config`: Show configuration discovery information

use crate::analysis::{AnalysisKind, Market, Period};
use crate::llm::ProviderId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "marketlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Structured market analysis from generative-AI providers")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path (skips discovery)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one analysis and print the result envelope as JSON
    Analyze(AnalyzeArgs),
    /// List providers with their capabilities and credential source
    Providers,
    /// Save an API key for a provider; a saved key overrides the environment
    SetKey {
        /// Provider id: gemini, deepseek or qwen
        provider: ProviderId,
        /// API key to store
        key: String,
    },
    /// Show configuration discovery information
    ShowConfig,
}

#[derive(Debug, clap::Args)]
pub struct AnalyzeArgs {
    /// market-overview, single-stock, timing, batch-timing or macro-forecast
    pub kind: AnalysisKind,
    /// Free-text query, a ticker, or a ticker list for batch timing
    #[arg(short = 'q', long = "query", default_value = "")]
    pub query: String,
    /// Market scope: CN, HK or US
    #[arg(short = 'm', long = "market", default_value = "CN")]
    pub market: Market,
    /// Time horizon: day or month
    #[arg(short = 'p', long = "period")]
    pub period: Option<Period>,
    /// Current price as you see it, to counter stale search data
    #[arg(long = "price-anchor", value_name = "PRICE")]
    pub price_anchor: Option<String>,
    /// Screenshot of a quote or chart (png, jpg, webp, gif)
    #[arg(short = 'i', long = "image", value_name = "FILE")]
    pub image: Option<PathBuf>,
    /// Provider override; defaults to the configured provider
    #[arg(long = "provider")]
    pub provider: Option<ProviderId>,
    /// Print the prompt that would be sent without calling any provider
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
}
