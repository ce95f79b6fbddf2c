//! Grounding context and action labels for scripted dialogue corpora.
//!
//! - [`graph`] / [`lore`]: the relationship graph of characters, locations
//!   and missions
//! - [`retriever`]: rule-ordered fact lookup for a dialogue turn
//! - [`annotation`]: batched action annotation with retry and merge-back
//! - [`summaries`]: memory/knowledge summary prompts and attachment pass

pub mod annotation;
pub mod context;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod graph;
pub mod logging;
pub mod lore;
pub mod manager;
pub mod retriever;
pub mod summaries;
pub mod validation;
