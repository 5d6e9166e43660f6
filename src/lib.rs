//! Shopper's Verdict: worth-to-buy scores for Amazon and Flipkart products.
//!
//! Reviews are fetched (or served from cache), split into aspects, scored
//! for sentiment and aggregated into a 0–100 worth score with pros, cons and
//! better-scoring alternatives.

pub mod api;
pub mod aspects;
pub mod config;
pub mod error;
pub mod explain;
pub mod model;
pub mod pipeline;
pub mod recommend;
pub mod scoring;
pub mod sentiment;
pub mod source;
pub mod store;
pub mod text;

pub use config::Settings;
pub use error::{AnalysisError, VerdictResult};
pub use pipeline::{AnalysisOutcome, Analyzer, ServedFrom};
