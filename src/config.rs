//! Runtime settings.
//!
//! Every heuristic constant of the pipeline lives here so it can be tuned
//! without touching the scoring code. Values come from the environment
//! (after `dotenv`) and fall back to defaults when missing or unparsable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{AnalysisError, VerdictResult};

#[derive(Debug, Clone)]
pub struct Settings {
    /// Analyses older than this are recomputed
    pub cache_expiry_days: i64,
    /// Stale entries older than this are evicted instead of serving as a fallback
    pub stale_max_age_days: i64,
    /// Cron expression (with seconds) for the periodic cache cleanup
    pub cleanup_schedule: String,
    /// Below this many reviews the score is damped toward `damping_midpoint`
    pub min_review_count: usize,
    pub damping_midpoint: f64,
    /// Score reported when there are no reviews at all
    pub neutral_score: u8,
    /// |polarity| below this is neutral
    pub neutral_threshold: f64,
    pub pros_cons_cap: usize,
    /// Weight of the star rating in the base score; aspect sentiment gets the rest
    pub rating_weight: f64,
    /// Results with confidence below this are flagged as low confidence
    pub low_confidence_threshold: f64,
    /// Neighbouring sentences on each side included when scoring a mention
    pub sentence_window: usize,
    pub max_reviews: usize,
    pub recommendation_limit: usize,
    /// Highest-scoring qualifying entries that get vectorized per request
    pub recommendation_pool_cap: usize,
    pub similarity_threshold: f64,
    /// Alternatives must beat the query score by at least this many points
    pub min_score_improvement: u8,
    pub svd_components: usize,
    pub fetch_timeout: Duration,
    /// Build an estimate from sample reviews when nothing else is available
    pub offline_fallback: bool,
    /// VADER compound scoring; the keyword lexicon is used otherwise
    pub use_vader: bool,
    pub cache_file: Option<PathBuf>,
    pub database_url: Option<String>,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_expiry_days: 3,
            stale_max_age_days: 30,
            cleanup_schedule: "0 0 * * * *".to_string(),
            min_review_count: 5,
            damping_midpoint: 60.0,
            neutral_score: 50,
            neutral_threshold: 0.05,
            pros_cons_cap: 5,
            rating_weight: 0.5,
            low_confidence_threshold: 0.3,
            sentence_window: 0,
            max_reviews: 50,
            recommendation_limit: 3,
            recommendation_pool_cap: 50,
            similarity_threshold: 0.1,
            min_score_improvement: 1,
            svd_components: 100,
            fetch_timeout: Duration::from_secs(30),
            offline_fallback: true,
            use_vader: true,
            cache_file: None,
            database_url: None,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparsable setting, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> VerdictResult<Self> {
        let d = Settings::default();
        let settings = Self {
            cache_expiry_days: env_or("CACHE_EXPIRY_DAYS", d.cache_expiry_days),
            stale_max_age_days: env_or("VERDICT_STALE_MAX_AGE_DAYS", d.stale_max_age_days),
            cleanup_schedule: env_opt("VERDICT_CLEANUP_SCHEDULE").unwrap_or(d.cleanup_schedule),
            min_review_count: env_or("VERDICT_MIN_REVIEW_COUNT", d.min_review_count),
            damping_midpoint: env_or("VERDICT_DAMPING_MIDPOINT", d.damping_midpoint),
            neutral_score: env_or("VERDICT_NEUTRAL_SCORE", d.neutral_score),
            neutral_threshold: env_or("VERDICT_NEUTRAL_THRESHOLD", d.neutral_threshold),
            pros_cons_cap: env_or("VERDICT_PROS_CONS_CAP", d.pros_cons_cap),
            rating_weight: env_or("VERDICT_RATING_WEIGHT", d.rating_weight),
            low_confidence_threshold: env_or(
                "VERDICT_LOW_CONFIDENCE_THRESHOLD",
                d.low_confidence_threshold,
            ),
            sentence_window: env_or("VERDICT_SENTENCE_WINDOW", d.sentence_window),
            max_reviews: env_or("VERDICT_MAX_REVIEWS", d.max_reviews),
            recommendation_limit: env_or("VERDICT_RECOMMENDATION_LIMIT", d.recommendation_limit),
            recommendation_pool_cap: env_or("VERDICT_RECOMMENDATION_POOL_CAP", d.recommendation_pool_cap),
            similarity_threshold: env_or("VERDICT_SIMILARITY_THRESHOLD", d.similarity_threshold),
            min_score_improvement: env_or("VERDICT_MIN_SCORE_IMPROVEMENT", d.min_score_improvement),
            svd_components: env_or("VERDICT_SVD_COMPONENTS", d.svd_components),
            fetch_timeout: Duration::from_secs(env_or(
                "VERDICT_FETCH_TIMEOUT_SECS",
                d.fetch_timeout.as_secs(),
            )),
            offline_fallback: env_or("VERDICT_OFFLINE_FALLBACK", d.offline_fallback),
            use_vader: env_or("VERDICT_USE_VADER", d.use_vader),
            cache_file: env_opt("VERDICT_CACHE_FILE").map(PathBuf::from),
            database_url: env_opt("DATABASE_URL"),
            bind_addr: env_opt("VERDICT_BIND_ADDR").unwrap_or(d.bind_addr),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject combinations the scoring code cannot work with.
    pub fn validate(&self) -> VerdictResult<()> {
        if !(0.0..=1.0).contains(&self.rating_weight) {
            return Err(AnalysisError::Config(format!(
                "rating weight must be within [0, 1], got {}",
                self.rating_weight
            )));
        }
        if !(0.0..1.0).contains(&self.neutral_threshold) {
            return Err(AnalysisError::Config(format!(
                "neutral threshold must be within [0, 1), got {}",
                self.neutral_threshold
            )));
        }
        if self.cache_expiry_days <= 0 {
            return Err(AnalysisError::Config("cache expiry must be at least one day".into()));
        }
        if self.neutral_score > 100 {
            return Err(AnalysisError::Config("neutral score must be within [0, 100]".into()));
        }
        if self.recommendation_limit > 0 && self.recommendation_pool_cap == 0 {
            return Err(AnalysisError::Config("recommendation pool cap must be at least one".into()));
        }
        if self.svd_components == 0 {
            return Err(AnalysisError::Config("SVD needs at least one component".into()));
        }
        Ok(())
    }

    pub fn cache_expiry(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_expiry_days)
    }

    pub fn stale_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.stale_max_age_days.max(self.cache_expiry_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let settings = Settings {
            rating_weight: 1.5,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_stale_age_never_below_expiry() {
        let settings = Settings {
            cache_expiry_days: 7,
            stale_max_age_days: 2,
            ..Settings::default()
        };
        assert_eq!(settings.stale_max_age(), chrono::Duration::days(7));
    }
}
