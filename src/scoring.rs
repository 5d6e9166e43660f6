//! Worth score aggregation.
//!
//! Blends the mean star rating with mean aspect polarity, damps thin review
//! sets toward a neutral midpoint and picks pros and cons.

use std::cmp::Ordering;

use tracing::debug;

use crate::config::Settings;
use crate::model::{AspectSentiment, DescriptionSummary, RecommendationLabel, Review};
use crate::text::{singularize, words};

/// Reviews at which confidence saturates.
const FULL_CONFIDENCE_REVIEWS: f64 = 15.0;

/// Everything the aggregator looks at.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    pub aspects: &'a [AspectSentiment],
    pub ratings: &'a [f64],
    pub review_count: usize,
    /// Mean whole-review polarity, used when there is nothing else
    pub review_polarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorthScore {
    pub score: u8,
    pub label: RecommendationLabel,
    pub pros: Vec<(String, f64)>,
    pub cons: Vec<(String, f64)>,
    pub confidence: f64,
    pub low_confidence: bool,
}

fn to_percent(polarity: f64) -> f64 {
    (polarity.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0
}

fn rating_percent(mean_rating: f64) -> f64 {
    (mean_rating.clamp(1.0, 5.0) - 1.0) / 4.0 * 100.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation; zero for fewer than two values.
fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

pub fn confidence(review_count: usize) -> f64 {
    (review_count as f64 / FULL_CONFIDENCE_REVIEWS).min(1.0)
}

/// Combine aspect sentiment, ratings and review volume into a worth score.
pub fn aggregate(inputs: ScoreInputs<'_>, settings: &Settings) -> WorthScore {
    let confidence = confidence(inputs.review_count);
    let low_confidence = confidence < settings.low_confidence_threshold;

    if inputs.review_count == 0 {
        let score = settings.neutral_score.min(100);
        debug!(score, "No reviews, reporting neutral score");
        return WorthScore {
            score,
            label: RecommendationLabel::from_score(score),
            pros: Vec::new(),
            cons: Vec::new(),
            confidence,
            low_confidence: true,
        };
    }

    let opinionated: Vec<f64> = inputs
        .aspects
        .iter()
        .filter(|a| a.is_opinionated())
        .map(|a| a.polarity)
        .collect();
    let rating = mean(inputs.ratings).map(rating_percent);
    let aspect = mean(&opinionated).map(to_percent);

    let base = match (rating, aspect) {
        (Some(r), Some(a)) => settings.rating_weight * r + (1.0 - settings.rating_weight) * a,
        (Some(r), None) => r,
        (None, Some(a)) => a,
        (None, None) => inputs
            .review_polarity
            .map(to_percent)
            .unwrap_or(f64::from(settings.neutral_score)),
    };

    let damped = if inputs.review_count < settings.min_review_count {
        let mid = settings.damping_midpoint;
        mid + (base - mid) * inputs.review_count as f64 / settings.min_review_count as f64
    } else {
        base
    };

    let score = damped.clamp(0.0, 100.0).round() as u8;
    let (pros, cons) = pros_and_cons(inputs.aspects, settings.neutral_threshold, settings.pros_cons_cap);

    debug!(
        base,
        damped,
        score,
        reviews = inputs.review_count,
        pros = pros.len(),
        cons = cons.len(),
        "Aggregated worth score"
    );

    WorthScore {
        score,
        label: RecommendationLabel::from_score(score),
        pros,
        cons,
        confidence,
        low_confidence,
    }
}

/// Pros in descending polarity, cons ascending; ties keep the input order.
pub fn pros_and_cons(
    aspects: &[AspectSentiment],
    threshold: f64,
    cap: usize,
) -> (Vec<(String, f64)>, Vec<(String, f64)>) {
    let mut pros: Vec<(String, f64)> = aspects
        .iter()
        .filter(|a| a.is_opinionated() && a.polarity > threshold)
        .map(|a| (a.aspect.clone(), a.polarity))
        .collect();
    let mut cons: Vec<(String, f64)> = aspects
        .iter()
        .filter(|a| a.is_opinionated() && a.polarity < -threshold)
        .map(|a| (a.aspect.clone(), a.polarity))
        .collect();

    pros.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    cons.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    pros.truncate(cap);
    cons.truncate(cap);
    (pros, cons)
}

fn feature_keywords(category: &str) -> &'static [&'static str] {
    match category {
        "smartphone" => &["camera", "battery", "display", "processor", "storage", "ram"],
        "laptop" => &["processor", "ram", "storage", "graphics", "display", "battery"],
        "tv" => &["4k", "hdr", "smart", "wifi", "bluetooth", "app"],
        "headphones" => &["bass", "battery", "bluetooth", "microphone", "noise", "driver"],
        _ => &["quality", "durable", "premium", "advanced", "efficient"],
    }
}

const QUALITY_WORDS: &[&str] = &["premium", "high-quality", "advanced", "professional", "certified"];
const QUALITY_BONUS: f64 = 0.1;

/// Which of the category's feature keywords the seller's description covers.
pub fn describe(description: &str, category: &str) -> DescriptionSummary {
    if description.trim().is_empty() {
        return DescriptionSummary {
            usability_score: 0.5,
            ..Default::default()
        };
    }

    let present: std::collections::HashSet<String> =
        words(description).iter().map(|w| singularize(w)).collect();
    let keywords = feature_keywords(category);
    let key_features: Vec<String> = keywords
        .iter()
        .filter(|k| present.contains(**k))
        .map(|k| k.to_string())
        .collect();
    let feature_completeness = key_features.len() as f64 / keywords.len() as f64;

    let lower = description.to_lowercase();
    let bonus = if QUALITY_WORDS.iter().any(|q| lower.contains(q)) {
        QUALITY_BONUS
    } else {
        0.0
    };

    DescriptionSummary {
        key_features,
        feature_completeness,
        usability_score: (feature_completeness + bonus).min(1.0),
    }
}

/// Heuristic review-set quality in [0, 1]: length, vocabulary and sentiment
/// diversity averaged. Uniform, copy-pasted review sets score low.
pub fn data_quality(reviews: &[Review], polarities: &[f64]) -> f64 {
    if reviews.len() < 3 {
        return 0.5;
    }

    let lengths: Vec<f64> = reviews.iter().map(|r| r.text().chars().count() as f64).collect();
    let length_factor = (stdev(&lengths) / 100.0).min(1.0);

    let all_words: Vec<String> = reviews.iter().flat_map(|r| words(r.text())).collect();
    let vocabulary_factor = if all_words.is_empty() {
        0.0
    } else {
        let unique: std::collections::HashSet<&String> = all_words.iter().collect();
        unique.len() as f64 / all_words.len() as f64
    };

    let sentiment_factor = stdev(polarities).min(1.0);

    ((length_factor + vocabulary_factor + sentiment_factor) / 3.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aspect(name: &str, polarity: f64, mentions: usize) -> AspectSentiment {
        AspectSentiment {
            aspect: name.to_string(),
            polarity,
            mentions,
            opinionated: mentions,
            evidence: Vec::new(),
        }
    }

    #[test]
    fn test_battery_pro_price_con() {
        let aspects = vec![aspect("battery", 0.6, 3), aspect("price", -0.4, 2)];
        let ratings = [4.0, 5.0, 4.0, 5.0, 4.5, 4.5];
        let result = aggregate(
            ScoreInputs {
                aspects: &aspects,
                ratings: &ratings,
                review_count: ratings.len(),
                review_polarity: None,
            },
            &Settings::default(),
        );
        assert_eq!(result.pros, vec![("battery".to_string(), 0.6)]);
        assert_eq!(result.cons, vec![("price".to_string(), -0.4)]);
        assert!(result.score > 60, "got {}", result.score);
        // 0.5 * 87.5 + 0.5 * 55
        assert_eq!(result.score, 71);
        assert_eq!(result.label, RecommendationLabel::Recommended);
    }

    #[test]
    fn test_zero_reviews_is_neutral_and_low_confidence() {
        let result = aggregate(
            ScoreInputs {
                aspects: &[],
                ratings: &[],
                review_count: 0,
                review_polarity: None,
            },
            &Settings::default(),
        );
        assert_eq!(result.score, 50);
        assert_eq!(result.label, RecommendationLabel::Acceptable);
        assert!(result.low_confidence);
        assert!(result.confidence < Settings::default().low_confidence_threshold);
    }

    #[test]
    fn test_few_reviews_damped_toward_midpoint() {
        let ratings = [5.0, 5.0];
        let result = aggregate(
            ScoreInputs {
                aspects: &[],
                ratings: &ratings,
                review_count: 2,
                review_polarity: None,
            },
            &Settings::default(),
        );
        // 60 + (100 - 60) * 2 / 5
        assert_eq!(result.score, 76);
    }

    #[test]
    fn test_polarity_fallback_without_ratings_or_aspects() {
        let result = aggregate(
            ScoreInputs {
                aspects: &[],
                ratings: &[],
                review_count: 10,
                review_polarity: Some(-0.5),
            },
            &Settings::default(),
        );
        assert_eq!(result.score, 25);
        assert_eq!(result.label, RecommendationLabel::NotRecommended);
    }

    #[test]
    fn test_one_sided_aspects_never_fabricate_cons() {
        let aspects = vec![aspect("camera", 0.8, 4), aspect("display", 0.3, 2)];
        let (pros, cons) = pros_and_cons(&aspects, 0.05, 5);
        assert_eq!(pros.len(), 2);
        assert_eq!(pros[0].0, "camera");
        assert!(cons.is_empty());
    }

    #[test]
    fn test_pros_capped_and_ties_keep_order() {
        let aspects: Vec<_> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .map(|n| aspect(n, 0.5, 1))
            .collect();
        let (pros, _) = pros_and_cons(&aspects, 0.05, 5);
        let names: Vec<_> = pros.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_neutral_aspects_not_listed() {
        let neutral = AspectSentiment {
            aspect: "box".to_string(),
            polarity: 0.0,
            mentions: 3,
            opinionated: 0,
            evidence: Vec::new(),
        };
        let (pros, cons) = pros_and_cons(&[neutral], 0.05, 5);
        assert!(pros.is_empty() && cons.is_empty());
    }

    #[test]
    fn test_confidence_saturates() {
        assert_eq!(confidence(0), 0.0);
        assert!((confidence(3) - 0.2).abs() < 1e-9);
        assert_eq!(confidence(40), 1.0);
    }

    #[test]
    fn test_data_quality_small_set_is_neutral() {
        let reviews = vec![Review::new("Works fine for me", None).unwrap()];
        assert_eq!(data_quality(&reviews, &[0.2]), 0.5);
    }

    #[test]
    fn test_data_quality_penalizes_duplicates() {
        let same: Vec<Review> = (0..5).map(|_| Review::new("good good good good", None).unwrap()).collect();
        let varied = vec![
            Review::new("Battery easily lasts two days with heavy use", None).unwrap(),
            Review::new("Camera struggles indoors, photos come out grainy and dull", None).unwrap(),
            Review::new("ok", None).unwrap(),
            Review::new("Display is bright, speakers are loud enough for movies and calls", None).unwrap(),
        ];
        let low = data_quality(&same, &[0.4; 5]);
        let high = data_quality(&varied, &[0.6, -0.5, 0.0, 0.7]);
        assert!(low < high, "{} vs {}", low, high);
    }

    #[test]
    fn test_describe_finds_category_features() {
        let summary = describe(
            "Premium phone with a 50MP camera, 5000mAh battery and AMOLED display. 8GB RAM.",
            "smartphone",
        );
        assert_eq!(summary.key_features, vec!["camera", "battery", "display", "ram"]);
        assert!((summary.feature_completeness - 4.0 / 6.0).abs() < 1e-9);
        assert!((summary.usability_score - (4.0 / 6.0 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_describe_empty_and_capped() {
        let empty = describe("  ", "laptop");
        assert!(empty.key_features.is_empty());
        assert_eq!(empty.usability_score, 0.5);

        let full = describe("Advanced, durable, efficient build of premium quality", "general");
        assert_eq!(full.feature_completeness, 1.0);
        assert_eq!(full.usability_score, 1.0);
    }
}
