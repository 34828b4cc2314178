//! Prompt construction.
//!
//! Every directive is self-contained: task, context, data-priority rule and
//! the JSON contract rendered from [`crate::schema::SchemaContract`].

pub mod builder;
pub mod templates;

pub use builder::{PromptBuilder, PromptDirective, PromptError, parse_ticker_list};
