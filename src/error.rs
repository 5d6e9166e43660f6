//! Typed errors for the analysis pipeline.

use thiserror::Error;

/// Everything that can go wrong between a product URL and a verdict.
///
/// `SourceUnavailable` and `NlpPipelineUnavailable` are recovered inside the
/// pipeline (cache or offline fallback, keyword extraction) and only show up
/// in logs.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Review fetch failed (network error, blocked request, page layout change)
    #[error("review source unavailable: {0}")]
    SourceUnavailable(String),

    /// URL host is not a supported store
    #[error("unsupported site: {host}")]
    UnsupportedSite { host: String },

    /// URL could not be parsed at all
    #[error("invalid product URL: {url}")]
    InvalidUrl { url: String },

    /// The linguistic aspect extractor cannot run
    #[error("NLP pipeline unavailable: {0}")]
    NlpPipelineUnavailable(String),

    /// Cache persistence failed
    #[error("cache error: {0}")]
    Cache(#[source] anyhow::Error),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// No score could be produced by any means
    #[error("analysis failed: {reason}")]
    AnalysisFailed { reason: String },
}

impl AnalysisError {
    /// Errors the pipeline answers with a cached or offline result instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnalysisError::SourceUnavailable(_))
    }
}

/// Result type alias for pipeline operations.
pub type VerdictResult<T> = std::result::Result<T, AnalysisError>;
