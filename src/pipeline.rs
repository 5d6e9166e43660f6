//! End-to-end analysis: URL in, verdict out.
//!
//! 1. Parse the URL into a product id; unsupported stores fail here.
//! 2. Serve a fresh cache entry untouched.
//! 3. Otherwise fetch reviews under a timeout. When the source is down, fall
//!    back to a stale cache entry, then to an offline estimate.
//! 4. Extract aspects, score sentiment, aggregate, write through the cache.
//! 5. Optionally rank better alternatives from the cache.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::aspects::{AspectExtractor, FallbackExtractor};
use crate::config::Settings;
use crate::error::{AnalysisError, VerdictResult};
use crate::explain;
use crate::model::{
    AnalysisMeta, AnalysisResult, Listing, Product, ProductUrl, Provenance,
    RecommendationCandidate,
};
use crate::recommend;
use crate::scoring::{self, ScoreInputs};
use crate::sentiment::{self, LexiconScorer, SentimentScorer, VaderScorer};
use crate::source::{ReviewSource, SampleReviewSource};
use crate::store::{CacheEntry, Lookup, ReviewStore};
use crate::text::split_sentences;

/// How a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    /// Computed now from live reviews
    Computed,
    /// Fresh cache entry
    Cache,
    /// Expired cache entry served because the source was unavailable
    StaleCache,
    /// Estimate from sample reviews; nothing live or cached was available
    Offline,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub product: Product,
    pub analysis: AnalysisResult,
    pub recommendations: Vec<RecommendationCandidate>,
    pub served_from: ServedFrom,
}

pub struct Analyzer {
    settings: Settings,
    store: Arc<ReviewStore>,
    source: Arc<dyn ReviewSource>,
    offline: SampleReviewSource,
    extractor: Box<dyn AspectExtractor>,
    scorer: Box<dyn SentimentScorer>,
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

impl Analyzer {
    pub fn new(settings: Settings, store: Arc<ReviewStore>, source: Arc<dyn ReviewSource>) -> Self {
        let scorer: Box<dyn SentimentScorer> = if settings.use_vader {
            Box::new(VaderScorer::new())
        } else {
            Box::new(LexiconScorer::new())
        };
        Self {
            settings,
            store,
            source,
            offline: SampleReviewSource::new(),
            extractor: Box::new(FallbackExtractor::default()),
            scorer,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn AspectExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_scorer(mut self, scorer: Box<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn store(&self) -> &Arc<ReviewStore> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Analyze `raw_url`, optionally with better-scoring alternatives.
    pub async fn analyze(
        &self,
        raw_url: &str,
        include_recommendations: bool,
    ) -> VerdictResult<AnalysisOutcome> {
        let url = ProductUrl::parse(raw_url)?;
        info!(product_id = %url.id, "Analysis requested");

        let stale = match self.store.lookup(&url.id).await {
            Lookup::Fresh(entry) => {
                info!(product_id = %url.id, score = entry.analysis.score, "Serving cached analysis");
                return Ok(self
                    .finish(entry.product, entry.analysis, ServedFrom::Cache, include_recommendations)
                    .await);
            }
            Lookup::Stale(entry) => Some(entry),
            Lookup::Miss => None,
        };

        let fetched = match tokio::time::timeout(
            self.settings.fetch_timeout,
            self.source.fetch_reviews(&url),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::SourceUnavailable(format!(
                "timed out after {}s",
                self.settings.fetch_timeout.as_secs()
            ))),
        };

        match fetched {
            Ok(listing) => {
                let product = listing.into_product(&url, self.settings.max_reviews);
                let analysis = self.analyze_product(&product, Provenance::Live)?;
                info!(
                    product_id = %product.id,
                    score = analysis.score,
                    label = %analysis.label,
                    reviews = product.reviews.len(),
                    "Analysis computed"
                );
                self.store
                    .put(CacheEntry::new(product.clone(), analysis.clone()))
                    .await;
                Ok(self
                    .finish(product, analysis, ServedFrom::Computed, include_recommendations)
                    .await)
            }
            Err(e) if e.is_recoverable() => {
                warn!(product_id = %url.id, source = self.source.name(), error = %e, "Review source unavailable");
                self.fall_back(&url, stale, e, include_recommendations).await
            }
            Err(e) => Err(e),
        }
    }

    async fn fall_back(
        &self,
        url: &ProductUrl,
        stale: Option<CacheEntry>,
        cause: AnalysisError,
        include_recommendations: bool,
    ) -> VerdictResult<AnalysisOutcome> {
        if let Some(entry) = stale {
            info!(product_id = %url.id, computed_at = %entry.computed_at, "Serving stale analysis");
            return Ok(self
                .finish(entry.product, entry.analysis, ServedFrom::StaleCache, include_recommendations)
                .await);
        }

        if !self.settings.offline_fallback {
            return Err(AnalysisError::AnalysisFailed {
                reason: format!("no reviews and no cached result ({})", cause),
            });
        }

        let category = crate::source::detect_category(&url.canonical, "", "");
        let product = self
            .offline
            .listing_for(&category)
            .into_product(url, self.settings.max_reviews);
        let analysis = self.analyze_product(&product, Provenance::Offline)?;
        warn!(product_id = %url.id, %category, score = analysis.score, "Serving offline estimate");
        // Estimates are never cached so the next request retries the live source.
        Ok(self
            .finish(product, analysis, ServedFrom::Offline, include_recommendations)
            .await)
    }

    async fn finish(
        &self,
        product: Product,
        analysis: AnalysisResult,
        served_from: ServedFrom,
        include_recommendations: bool,
    ) -> AnalysisOutcome {
        let recommendations = if include_recommendations {
            self.recommendations_for(&product, &analysis).await
        } else {
            Vec::new()
        };
        AnalysisOutcome {
            product,
            analysis,
            recommendations,
            served_from,
        }
    }

    /// Better-scoring alternatives among the fresh cache entries.
    ///
    /// Ranking is CPU-bound, so it runs on the blocking pool.
    pub async fn recommendations_for(
        &self,
        product: &Product,
        analysis: &AnalysisResult,
    ) -> Vec<RecommendationCandidate> {
        let snapshot = self.store.fresh_snapshot(Utc::now());
        if snapshot.is_empty() {
            return Vec::new();
        }
        let query = CacheEntry::new(product.clone(), analysis.clone());
        let settings = self.settings.clone();

        let ranked = tokio::task::spawn_blocking(move || {
            let pool: Vec<Listing<'_>> = snapshot.iter().map(CacheEntry::listing).collect();
            recommend::recommend(query.listing(), &pool, &settings)
        })
        .await;

        ranked.unwrap_or_else(|e| {
            warn!(product_id = %product.id, error = %e, "Recommendation ranking aborted");
            Vec::new()
        })
    }

    /// Score a product's reviews. Pure computation, no I/O.
    pub fn analyze_product(
        &self,
        product: &Product,
        provenance: Provenance,
    ) -> VerdictResult<AnalysisResult> {
        let reviews = &product.reviews;
        let aspects = self.extractor.extract(reviews, &product.category)?;
        let aspect_sentiments: Vec<_> = sentiment::score_aspects(
            reviews,
            &aspects,
            self.scorer.as_ref(),
            self.settings.neutral_threshold,
            self.settings.sentence_window,
        )
        .into_iter()
        .map(|mut a| {
            a.polarity = round3(a.polarity);
            a
        })
        .collect();

        let polarities = sentiment::review_polarities(reviews, self.scorer.as_ref());
        let review_polarity = if polarities.is_empty() {
            None
        } else {
            Some(polarities.iter().sum::<f64>() / polarities.len() as f64)
        };
        let ratings: Vec<f64> = reviews.iter().filter_map(|r| r.rating()).collect();

        let worth = scoring::aggregate(
            ScoreInputs {
                aspects: &aspect_sentiments,
                ratings: &ratings,
                review_count: reviews.len(),
                review_polarity,
            },
            &self.settings,
        );

        let meta = AnalysisMeta {
            confidence: round3(worth.confidence),
            data_quality: round3(scoring::data_quality(reviews, &polarities)),
            reviews_used: reviews.len(),
            sentences: reviews.iter().map(|r| split_sentences(r.text()).len()).sum(),
            low_confidence: worth.low_confidence,
            provenance,
            category: product.category.clone(),
        };

        let mut analysis = AnalysisResult {
            product_id: product.id.clone(),
            score: worth.score,
            label: worth.label,
            voice_verdict: explain::voice_verdict(worth.score, &worth.pros, &worth.cons, &product.category),
            pros: worth.pros,
            cons: worth.cons,
            aspects: aspect_sentiments,
            distribution: sentiment::distribution(&polarities),
            meta,
            insight: String::new(),
            description: scoring::describe(&product.description, &product.category),
            computed_at: Utc::now(),
        };
        analysis.insight = explain::insight(&analysis);
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecommendationLabel;
    use crate::source::{RawListing, RawReview};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        listing: Option<RawListing>,
        delay: Option<std::time::Duration>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReviewSource for Scripted {
        async fn fetch_reviews(&self, _url: &ProductUrl) -> VerdictResult<RawListing> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.listing
                .clone()
                .ok_or_else(|| AnalysisError::SourceUnavailable("scripted outage".into()))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn analyzer(listing: Option<RawListing>, settings: Settings) -> (Analyzer, Arc<Scripted>) {
        build(listing, None, settings)
    }

    fn build(
        listing: Option<RawListing>,
        delay: Option<std::time::Duration>,
        settings: Settings,
    ) -> (Analyzer, Arc<Scripted>) {
        let source = Arc::new(Scripted {
            listing,
            delay,
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(ReviewStore::new(&settings));
        let analyzer = Analyzer::new(settings, store, source.clone())
            .with_scorer(Box::new(LexiconScorer::new()));
        (analyzer, source)
    }

    fn phone_listing() -> RawListing {
        RawListing {
            title: "Acme Phone X".into(),
            category: Some("smartphone".into()),
            reviews: vec![
                RawReview::new("The battery is excellent and lasts two days.", Some(5.0)),
                RawReview::new("Great battery, the camera is terrible in low light.", Some(4.0)),
                RawReview::new("Camera is blurry. Battery is amazing though.", Some(4.0)),
                RawReview::new("Display is good, battery is great.", Some(5.0)),
                RawReview::new("Camera is poor but the price is fine.", Some(4.5)),
            ],
            ..Default::default()
        }
    }

    const URL: &str = "https://www.amazon.in/Acme-Phone-X/dp/B0ABC12345?ref=xyz";

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let (analyzer, source) = analyzer(Some(phone_listing()), Settings::default());
        let first = analyzer.analyze(URL, false).await.unwrap();
        let second = analyzer.analyze("amazon.in/dp/B0ABC12345", false).await.unwrap();

        assert_eq!(first.served_from, ServedFrom::Computed);
        assert_eq!(second.served_from, ServedFrom::Cache);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            serde_json::to_string(&first.analysis).unwrap(),
            serde_json::to_string(&second.analysis).unwrap()
        );
    }

    #[tokio::test]
    async fn test_pros_and_cons_from_reviews() {
        let (analyzer, _) = analyzer(Some(phone_listing()), Settings::default());
        let outcome = analyzer.analyze(URL, false).await.unwrap();
        let a = outcome.analysis;

        assert!(a.pro_names().any(|p| p == "battery"));
        assert!(a.con_names().any(|c| c == "camera"));
        assert!(a.pro_names().all(|p| !a.con_names().any(|c| c == p)));
        assert!(a.pros.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(a.cons.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(a.meta.provenance, Provenance::Live);
    }

    #[tokio::test]
    async fn test_outage_without_cache_gives_offline_estimate() {
        let (analyzer, _) = analyzer(None, Settings::default());
        let outcome = analyzer.analyze(URL, false).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Offline);
        assert_eq!(outcome.analysis.meta.provenance, Provenance::Offline);
        assert!(analyzer.store().is_empty());
    }

    #[tokio::test]
    async fn test_outage_with_offline_disabled_fails() {
        let settings = Settings {
            offline_fallback: false,
            ..Settings::default()
        };
        let (analyzer, _) = analyzer(None, settings);
        let err = analyzer.analyze(URL, false).await.unwrap_err();
        assert!(matches!(err, AnalysisError::AnalysisFailed { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_site_not_fetched() {
        let (analyzer, source) = analyzer(Some(phone_listing()), Settings::default());
        let err = analyzer.analyze("https://www.ebay.com/itm/123", false).await.unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedSite { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_reviews_is_neutral() {
        let listing = RawListing {
            title: "Acme Phone X".into(),
            ..Default::default()
        };
        let (analyzer, _) = analyzer(Some(listing), Settings::default());
        let a = analyzer.analyze(URL, false).await.unwrap().analysis;
        assert_eq!(a.score, 50);
        assert!(a.meta.low_confidence);
        assert!(a.pros.is_empty() && a.cons.is_empty());
    }

    /// A cache entry for `url` computed `age` ago from the phone reviews.
    fn aged_entry(analyzer: &Analyzer, url: &str, age: chrono::Duration) -> CacheEntry {
        let product = phone_listing().into_product(&ProductUrl::parse(url).unwrap(), 50);
        let mut analysis = analyzer.analyze_product(&product, Provenance::Live).unwrap();
        analysis.computed_at = Utc::now() - age;
        CacheEntry::new(product, analysis)
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_falls_back_to_stale_entry() {
        let slow = Some(std::time::Duration::from_secs(3600));
        let (analyzer, source) = build(Some(phone_listing()), slow, Settings::default());
        let entry = aged_entry(&analyzer, URL, chrono::Duration::days(10));
        let score = entry.analysis.score;
        analyzer.store().put(entry).await;

        let outcome = analyzer.analyze(URL, false).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.served_from, ServedFrom::StaleCache);
        assert_eq!(outcome.analysis.score, score);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_without_cache_gives_offline_estimate() {
        let slow = Some(std::time::Duration::from_secs(3600));
        let (analyzer, _) = build(Some(phone_listing()), slow, Settings::default());

        let outcome = analyzer.analyze(URL, false).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Offline);
        assert_eq!(outcome.analysis.meta.provenance, Provenance::Offline);
        assert!(analyzer.store().is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_do_not_back_recommendations() {
        let (analyzer, _) = analyzer(Some(phone_listing()), Settings::default());
        let query = analyzer.analyze(URL, false).await.unwrap();
        assert!(query.analysis.score < 100);

        let other = "https://www.amazon.in/dp/B0XYZ98765";
        let mut better = aged_entry(&analyzer, other, chrono::Duration::days(10));
        better.analysis.score = 100;
        better.analysis.label = RecommendationLabel::from_score(100);
        analyzer.store().put(better.clone()).await;
        assert!(analyzer
            .recommendations_for(&query.product, &query.analysis)
            .await
            .is_empty());

        better.computed_at = Utc::now();
        better.analysis.computed_at = better.computed_at;
        analyzer.store().put(better).await;
        let recs = analyzer
            .recommendations_for(&query.product, &query.analysis)
            .await;
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].product_id.as_str(), "amazon:B0XYZ98765");
    }
}
