//! Sentence-level sentiment scoring.
//!
//! Two interchangeable strategies sit behind [`SentimentScorer`]: VADER
//! compound scoring and a small keyword lexicon with negation handling that
//! needs no external data. Aspect polarity is computed on top of whichever
//! scorer the pipeline was built with.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::aspects::{Aspect, AspectMap};
use crate::model::{AspectSentiment, Review, SentimentDistribution};
use crate::text::{split_sentences, words};

/// Reviews above this overall polarity count as positive, below its negation as negative.
pub const REVIEW_POLARITY_CUTOFF: f64 = 0.1;

/// Scores a sentence (or a short window of sentences) to a compound polarity in [-1, 1].
pub trait SentimentScorer: Send + Sync {
    fn score(&self, sentence: &str) -> f64;

    fn name(&self) -> &'static str;
}

// ============================================================================
// VADER
// ============================================================================

pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn score(&self, sentence: &str) -> f64 {
        if sentence.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(sentence);
        scores
            .get("compound")
            .copied()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "vader"
    }
}

// ============================================================================
// Keyword lexicon
// ============================================================================

// Review-flavoured valences; product complaints ("lag", "flimsy", "defective")
// matter more here than in general-purpose lists.
static LEXICON: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let positive = [
        ("excellent", 3.0), ("amazing", 3.0), ("fantastic", 3.0), ("outstanding", 3.0),
        ("superb", 3.0), ("perfect", 3.0), ("awesome", 3.0), ("brilliant", 3.0),
        ("stunning", 3.0), ("best", 2.5), ("love", 2.5), ("loved", 2.5), ("wonderful", 2.5),
        ("impressive", 2.5), ("great", 2.5), ("beautiful", 2.5), ("good", 2.0),
        ("recommend", 2.0), ("recommended", 2.0), ("happy", 2.0), ("pleased", 2.0),
        ("satisfied", 2.0), ("reliable", 2.0), ("smooth", 1.5), ("solid", 1.5), ("fast", 1.5),
        ("nice", 1.5), ("premium", 1.5), ("comfortable", 1.5), ("crisp", 1.5), ("clear", 1.0),
        ("vibrant", 1.5), ("worth", 1.5), ("decent", 1.0), ("fine", 0.8), ("easy", 1.0),
        ("durable", 1.5), ("responsive", 1.5), ("sharp", 1.0), ("quiet", 1.0),
    ];
    let negative = [
        ("terrible", -3.0), ("awful", -3.0), ("horrible", -3.0), ("worst", -3.0),
        ("useless", -3.0), ("hate", -3.0), ("garbage", -3.0), ("pathetic", -3.0),
        ("defective", -2.5), ("broken", -2.5), ("waste", -2.5), ("regret", -2.5),
        ("disappointing", -2.5), ("disappointed", -2.5), ("fraud", -2.5), ("fake", -2.0),
        ("bad", -2.5), ("poor", -2.5), ("flimsy", -2.0), ("fail", -2.0), ("failed", -2.0),
        ("problem", -1.5), ("problems", -1.5), ("issue", -1.5), ("issues", -1.5),
        ("slow", -1.5), ("lag", -1.5), ("laggy", -2.0), ("overpriced", -2.0),
        ("expensive", -1.0), ("cheap", -1.0), ("weak", -1.5), ("heats", -1.5),
        ("hot", -1.0), ("noisy", -1.5), ("drains", -1.5), ("crash", -2.0), ("crashes", -2.0),
        ("mediocre", -1.5), ("average", -0.5), ("dull", -1.5), ("blurry", -2.0),
    ];
    positive.into_iter().chain(negative).collect()
});

static NEGATIONS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "wasn't", "aren't",
        "won't", "can't", "cannot", "hardly", "without", "nothing", "neither",
    ]
});

const BOOSTERS: &[(&str, f64)] = &[
    ("very", 0.3), ("really", 0.3), ("extremely", 0.4), ("super", 0.3), ("absolutely", 0.4),
    ("so", 0.2), ("highly", 0.3), ("slightly", -0.3), ("somewhat", -0.3),
];

/// Normalization constant shared with VADER: compound = s / sqrt(s² + α).
const ALPHA: f64 = 15.0;

/// Lexicon scorer used when VADER is disabled.
#[derive(Debug, Default, Clone)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, sentence: &str) -> f64 {
        let tokens = words(sentence);
        let mut sum = 0.0;

        for (i, token) in tokens.iter().enumerate() {
            let Some(&valence) = LEXICON.get(token.as_str()) else {
                continue;
            };
            let window = &tokens[i.saturating_sub(3)..i];
            let mut v = valence;
            if let Some(prev) = window.last() {
                if let Some((_, boost)) = BOOSTERS.iter().find(|(b, _)| *b == prev.as_str()) {
                    v += boost * v.signum();
                }
            }
            if window.iter().any(|w| NEGATIONS.contains(&w.as_str())) {
                v *= -0.74;
            }
            sum += v;
        }

        if sentence.contains('!') && sum != 0.0 {
            sum += 0.3 * sum.signum();
        }

        if sum == 0.0 {
            0.0
        } else {
            (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
        }
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

// ============================================================================
// Aspect polarity
// ============================================================================

/// Mentions at least this strong are quoted as evidence.
const EVIDENCE_MIN_POLARITY: f64 = 0.3;
const MAX_EVIDENCE: usize = 3;

/// Polarity for every aspect in `aspects`, in the map's order.
///
/// Each mention is the sentence containing an aspect term, widened by
/// `window` neighbouring sentences on each side. Mentions with
/// |polarity| < `neutral_threshold` are counted but left out of the mean.
pub fn score_aspects(
    reviews: &[Review],
    aspects: &AspectMap,
    scorer: &dyn SentimentScorer,
    neutral_threshold: f64,
    window: usize,
) -> Vec<AspectSentiment> {
    let sentences: Vec<Vec<String>> = reviews.iter().map(|r| split_sentences(r.text())).collect();

    aspects
        .iter()
        .filter_map(|aspect| {
            let sentiment = score_aspect(aspect, &sentences, scorer, neutral_threshold, window);
            if sentiment.is_none() {
                debug!(aspect = %aspect.name, "Aspect has no matching sentence, skipping");
            }
            sentiment
        })
        .collect()
}

fn score_aspect(
    aspect: &Aspect,
    sentences: &[Vec<String>],
    scorer: &dyn SentimentScorer,
    neutral_threshold: f64,
    window: usize,
) -> Option<AspectSentiment> {
    let mut mentions = 0usize;
    let mut polarities = Vec::new();
    let mut evidence: Vec<String> = Vec::new();

    for &review_idx in &aspect.reviews {
        let Some(review_sentences) = sentences.get(review_idx) else {
            continue;
        };
        for (i, sentence) in review_sentences.iter().enumerate() {
            if !aspect.matches(sentence) {
                continue;
            }
            let lo = i.saturating_sub(window);
            let hi = (i + window).min(review_sentences.len() - 1);
            let text = review_sentences[lo..=hi].join(". ");
            let polarity = scorer.score(&text);
            mentions += 1;
            if polarity.abs() >= neutral_threshold {
                polarities.push(polarity);
            }
            if polarity.abs() > EVIDENCE_MIN_POLARITY
                && evidence.len() < MAX_EVIDENCE
                && !evidence.contains(sentence)
            {
                evidence.push(sentence.clone());
            }
        }
    }

    if mentions == 0 {
        return None;
    }
    let polarity = if polarities.is_empty() {
        0.0
    } else {
        polarities.iter().sum::<f64>() / polarities.len() as f64
    };

    Some(AspectSentiment {
        aspect: aspect.name.clone(),
        polarity: polarity.clamp(-1.0, 1.0),
        mentions,
        opinionated: polarities.len(),
        evidence,
    })
}

/// Whole-review polarity, one value per review.
pub fn review_polarities(reviews: &[Review], scorer: &dyn SentimentScorer) -> Vec<f64> {
    reviews.iter().map(|r| scorer.score(r.text())).collect()
}

pub fn distribution(polarities: &[f64]) -> SentimentDistribution {
    let positive = polarities.iter().filter(|p| **p > REVIEW_POLARITY_CUTOFF).count();
    let negative = polarities.iter().filter(|p| **p < -REVIEW_POLARITY_CUTOFF).count();
    SentimentDistribution {
        positive,
        negative,
        neutral: polarities.len() - positive - negative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspects::Aspect;

    #[test]
    fn test_lexicon_positive_sentiment() {
        let score = LexiconScorer::new().score("The camera is amazing and the photos are stunning!");
        assert!(score > 0.5, "got {}", score);
    }

    #[test]
    fn test_lexicon_negative_sentiment() {
        let score = LexiconScorer::new().score("Battery is terrible, total waste of money");
        assert!(score < -0.5, "got {}", score);
    }

    #[test]
    fn test_lexicon_negation_flips() {
        let scorer = LexiconScorer::new();
        assert!(scorer.score("The display is good") > 0.0);
        assert!(scorer.score("The display is not good") < 0.0);
    }

    #[test]
    fn test_lexicon_neutral_sentiment() {
        assert_eq!(LexiconScorer::new().score("The item arrived on Tuesday"), 0.0);
    }

    #[test]
    fn test_vader_polarity_signs() {
        let scorer = VaderScorer::new();
        assert!(scorer.score("The battery life is great, I love it") > 0.05);
        assert!(scorer.score("The battery is horrible and dies fast") < -0.05);
        assert_eq!(scorer.score("   "), 0.0);
    }

    #[test]
    fn test_neutral_mentions_counted_but_not_averaged() {
        let reviews = vec![
            Review::new("The battery is excellent", None).unwrap(),
            Review::new("The battery is in the box", None).unwrap(),
        ];
        let mut map = AspectMap::default();
        let mut battery = Aspect::new("battery");
        battery.add_term("battery");
        battery.reviews.insert(0);
        battery.reviews.insert(1);
        map.insert(battery);

        let result = score_aspects(&reviews, &map, &LexiconScorer::new(), 0.05, 0);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].mentions, 2);
        assert_eq!(result[0].opinionated, 1);
        assert!(result[0].polarity > 0.5);
    }

    #[test]
    fn test_all_neutral_mentions_give_zero_polarity() {
        let reviews = vec![Review::new("The charger is white", None).unwrap()];
        let mut map = AspectMap::default();
        let mut charger = Aspect::new("charger");
        charger.add_term("charger");
        charger.reviews.insert(0);
        map.insert(charger);

        let result = score_aspects(&reviews, &map, &LexiconScorer::new(), 0.05, 0);
        assert_eq!(result[0].polarity, 0.0);
        assert!(!result[0].is_opinionated());
    }

    #[test]
    fn test_evidence_keeps_strong_sentences_only() {
        let reviews = vec![
            Review::new("The camera is amazing. The camera has a bump.", None).unwrap(),
            Review::new("Camera is terrible at night.", None).unwrap(),
            Review::new("Camera is excellent. Camera is great outdoors. Camera is awesome.", None).unwrap(),
        ];
        let mut map = AspectMap::default();
        let mut camera = Aspect::new("camera");
        camera.add_term("camera");
        camera.reviews.extend([0, 1, 2]);
        map.insert(camera);

        let result = score_aspects(&reviews, &map, &LexiconScorer::new(), 0.05, 0);
        let evidence = &result[0].evidence;
        assert_eq!(evidence.len(), 3);
        assert_eq!(evidence[0], "The camera is amazing");
        assert_eq!(evidence[1], "Camera is terrible at night");
        assert!(evidence.iter().all(|s| !s.contains("bump")));
    }

    #[test]
    fn test_distribution_counts() {
        let dist = distribution(&[0.8, -0.5, 0.05, 0.0, 0.3]);
        assert_eq!(dist.positive, 2);
        assert_eq!(dist.negative, 1);
        assert_eq!(dist.neutral, 2);
    }
}
