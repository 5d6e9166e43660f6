//! Aspect extraction: which product features do reviews talk about?
//!
//! [`PhraseExtractor`] chunks noun phrases out of each sentence with a
//! rule-based tagger and folds them onto category seed aspects.
//! [`KeywordExtractor`] only looks for seed terms; it is the degraded mode
//! used when the phrase chunker cannot run on the input.

use std::collections::{BTreeSet, HashMap, HashSet};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::{AnalysisError, VerdictResult};
use crate::model::Review;
use crate::text::{is_stop_word, singularize, split_sentences, words};

// ============================================================================
// Seed aspects
// ============================================================================

type SeedTable = &'static [(&'static str, &'static [&'static str])];

const SMARTPHONE: SeedTable = &[
    ("camera", &["camera", "photo", "picture", "video", "lens", "zoom", "selfie"]),
    ("battery", &["battery", "charge", "charging", "charger", "backup"]),
    ("performance", &["performance", "speed", "fast", "slow", "lag", "smooth", "processor"]),
    ("display", &["display", "screen", "brightness", "resolution"]),
    ("design", &["design", "build", "premium", "plastic", "metal"]),
    ("software", &["software", "ui", "interface", "update", "android", "ios"]),
    ("audio", &["sound", "audio", "speaker", "music", "call", "volume"]),
    ("value", &["price", "value", "money", "worth", "expensive", "cheap"]),
];

const LAPTOP: SeedTable = &[
    ("performance", &["performance", "speed", "processor", "cpu", "ram", "fast", "slow"]),
    ("battery", &["battery", "backup", "charge", "charger", "hour"]),
    ("keyboard", &["keyboard", "typing", "key", "trackpad", "touchpad"]),
    ("display", &["display", "screen", "brightness", "resolution"]),
    ("build", &["build", "construction", "durability", "solid"]),
    ("portability", &["weight", "portable", "carry", "travel", "size"]),
    ("cooling", &["heat", "temperature", "cooling", "fan", "thermal"]),
    ("value", &["price", "value", "money", "worth", "expensive", "cheap"]),
];

const TV: SeedTable = &[
    ("picture", &["picture", "image", "color", "colour", "contrast", "clarity"]),
    ("sound", &["sound", "audio", "speaker", "volume", "bass"]),
    ("smart features", &["smart", "app", "interface", "remote", "wifi"]),
    ("design", &["design", "look", "appearance", "stand", "mounting"]),
    ("size", &["size", "inch", "big", "small"]),
    ("value", &["price", "value", "money", "worth", "expensive", "cheap"]),
];

const HEADPHONES: SeedTable = &[
    ("sound", &["sound", "audio", "bass", "treble", "music", "volume"]),
    ("comfort", &["comfort", "comfortable", "fit", "ear", "cushion", "weight"]),
    ("battery", &["battery", "charge", "charging", "backup", "hour"]),
    ("noise cancellation", &["noise", "anc", "cancellation", "isolation"]),
    ("connectivity", &["bluetooth", "connection", "pairing", "connectivity", "mic"]),
    ("value", &["price", "value", "money", "worth", "expensive", "cheap"]),
];

const CAMERA: SeedTable = &[
    ("image quality", &["image", "photo", "picture", "sharpness", "detail", "color"]),
    ("autofocus", &["focus", "autofocus", "af"]),
    ("lens", &["lens", "zoom", "aperture"]),
    ("battery", &["battery", "charge", "charging", "shot"]),
    ("handling", &["grip", "handling", "weight", "button", "menu"]),
    ("value", &["price", "value", "money", "worth", "expensive", "cheap"]),
];

const TABLET: SeedTable = &[
    ("display", &["display", "screen", "brightness", "resolution"]),
    ("performance", &["performance", "speed", "fast", "slow", "lag", "smooth"]),
    ("battery", &["battery", "charge", "charging", "backup"]),
    ("stylus", &["stylus", "pen", "pencil"]),
    ("audio", &["sound", "audio", "speaker", "volume"]),
    ("value", &["price", "value", "money", "worth", "expensive", "cheap"]),
];

const WATCH: SeedTable = &[
    ("battery", &["battery", "charge", "charging", "backup"]),
    ("fitness tracking", &["step", "heart", "tracking", "sleep", "workout", "spo2"]),
    ("display", &["display", "screen", "brightness"]),
    ("strap", &["strap", "band", "buckle"]),
    ("app", &["app", "notification", "sync"]),
    ("value", &["price", "value", "money", "worth", "expensive", "cheap"]),
];

const GENERAL: SeedTable = &[
    ("quality", &["quality", "build", "construction", "material"]),
    ("performance", &["performance", "speed", "fast", "slow", "work"]),
    ("design", &["design", "look", "appearance", "style"]),
    ("value", &["price", "value", "money", "worth", "cost"]),
    ("durability", &["durable", "lasting", "break", "fragile", "solid"]),
    ("delivery", &["delivery", "packaging", "shipping"]),
];

/// Seed aspects and their surface terms for a category; unknown categories get `general`.
pub fn seed_aspects(category: &str) -> SeedTable {
    match category {
        "smartphone" => SMARTPHONE,
        "laptop" => LAPTOP,
        "tv" => TV,
        "headphones" => HEADPHONES,
        "camera" => CAMERA,
        "tablet" => TABLET,
        "watch" => WATCH,
        _ => GENERAL,
    }
}

// ============================================================================
// Aspect map
// ============================================================================

/// One aspect and where it was seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Aspect {
    pub name: String,
    /// Indices into the review list
    pub reviews: BTreeSet<usize>,
    /// Normalized surface forms (singularized words joined by one space)
    pub terms: BTreeSet<String>,
    pub seeded: bool,
}

impl Aspect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reviews: BTreeSet::new(),
            terms: BTreeSet::new(),
            seeded: false,
        }
    }

    pub fn add_term(&mut self, term: &str) {
        let normalized = normalize_phrase(term);
        if !normalized.is_empty() {
            self.terms.insert(normalized);
        }
    }

    /// Does `sentence` mention any of this aspect's terms?
    pub fn matches(&self, sentence: &str) -> bool {
        let padded = format!(" {} ", normalize_phrase(sentence));
        self.terms.iter().any(|t| padded.contains(&format!(" {} ", t)))
    }

    pub fn support(&self) -> usize {
        self.reviews.len()
    }
}

fn normalize_phrase(text: &str) -> String {
    words(text)
        .iter()
        .map(|w| singularize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Aspects keyed by name, iterated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AspectMap {
    aspects: Vec<Aspect>,
    index: HashMap<String, usize>,
}

impl AspectMap {
    /// Insert, merging reviews and terms into an existing aspect of the same name.
    pub fn insert(&mut self, aspect: Aspect) {
        match self.index.get(&aspect.name) {
            Some(&i) => {
                let existing = &mut self.aspects[i];
                existing.reviews.extend(aspect.reviews);
                existing.terms.extend(aspect.terms);
                existing.seeded |= aspect.seeded;
            }
            None => {
                self.index.insert(aspect.name.clone(), self.aspects.len());
                self.aspects.push(aspect);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Aspect> {
        self.index.get(name).map(|&i| &self.aspects[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aspect> {
        self.aspects.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.aspects.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    fn retain(&mut self, keep: impl Fn(&Aspect) -> bool) {
        self.aspects.retain(|a| keep(a));
        self.index = self
            .aspects
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i))
            .collect();
    }
}

/// Minimum number of distinct reviews a non-seed aspect needs.
pub fn min_support(total_reviews: usize) -> usize {
    if total_reviews < 5 {
        1
    } else {
        2
    }
}

// ============================================================================
// Extractors
// ============================================================================

pub trait AspectExtractor: Send + Sync {
    fn extract(&self, reviews: &[Review], category: &str) -> VerdictResult<AspectMap>;

    fn name(&self) -> &'static str;
}

/// Matches category seed terms only.
#[derive(Debug, Default, Clone)]
pub struct KeywordExtractor;

impl AspectExtractor for KeywordExtractor {
    fn extract(&self, reviews: &[Review], category: &str) -> VerdictResult<AspectMap> {
        let seeds = seeded_aspects(category);
        let mut map = AspectMap::default();

        for (idx, review) in reviews.iter().enumerate() {
            for sentence in split_sentences(review.text()) {
                for seed in &seeds {
                    if seed.matches(&sentence) {
                        let mut hit = Aspect::new(seed.name.clone());
                        hit.terms = seed.terms.clone();
                        hit.seeded = true;
                        hit.reviews.insert(idx);
                        map.insert(hit);
                    }
                }
            }
        }
        Ok(map)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

fn seeded_aspects(category: &str) -> Vec<Aspect> {
    seed_aspects(category)
        .iter()
        .map(|(name, terms)| {
            let mut aspect = Aspect::new(*name);
            aspect.seeded = true;
            for term in *terms {
                aspect.add_term(term);
            }
            aspect
        })
        .collect()
}

// Closed-class words and common verbs the chunker never treats as nouns.
static NON_NOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "is", "was", "are", "were", "be", "been", "am", "has", "have", "had", "do", "does", "did",
        "get", "gets", "got", "make", "makes", "made", "work", "works", "worked", "use", "used",
        "using", "feel", "feels", "felt", "look", "looks", "seem", "seems", "last", "lasts",
        "come", "comes", "came", "go", "goes", "went", "take", "takes", "took", "give", "gives",
        "gave", "want", "need", "like", "likes", "liked", "think", "know", "say", "said",
        "received", "arrived", "ordered", "recommend", "recommended", "love", "loved", "hate",
        "bought", "buying", "returned", "stopped", "started", "keep", "keeps", "kept", "charges",
        "better", "worse", "best", "worst", "good", "great", "bad", "nice", "poor", "excellent",
        "amazing", "awesome", "terrible", "awful", "decent", "perfect", "overall", "totally",
        "new", "old", "big", "small", "high", "low", "long", "short", "full", "whole", "many",
        "first", "second", "last", "next", "another", "every", "never", "always", "ever",
        "yes", "okay", "ok", "thanks", "please", "wow", "value", "money", "worth",
    ]
    .into_iter()
    .collect()
});

const ADJECTIVE_SUFFIXES: &[&str] = &["ful", "ive", "ous", "able", "ible", "less", "ish", "ic"];
const MAX_PHRASE_WORDS: usize = 2;
const MAX_DISCOVERED_ASPECTS: usize = 15;

fn is_noun_candidate(word: &str) -> bool {
    word.len() >= 3
        && word.chars().all(|c| c.is_ascii_alphabetic())
        && !is_stop_word(word)
        && !NON_NOUNS.contains(word)
        && !word.ends_with("ly")
        && !word.ends_with("ed")
        && !word.ends_with("ing")
        && !word.contains('\'')
        && !ADJECTIVE_SUFFIXES.iter().any(|s| word.ends_with(s) && word.len() > s.len() + 2)
}

/// Rule-based noun-phrase chunker.
#[derive(Debug, Clone)]
pub struct PhraseExtractor {
    /// Share of Latin letters below which the chunker refuses the input
    pub min_latin_ratio: f64,
}

impl Default for PhraseExtractor {
    fn default() -> Self {
        Self {
            min_latin_ratio: 0.6,
        }
    }
}

impl PhraseExtractor {
    /// Noun phrases in one sentence: runs of noun candidates, at most
    /// `MAX_PHRASE_WORDS` long (the rightmost words, where the head sits).
    /// Seed terms are always phrase boundaries so "battery life" and
    /// "charging speed" both surface their seed word.
    fn chunk(sentence: &str, seed_words: &HashSet<String>) -> Vec<Vec<String>> {
        let mut phrases = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for word in words(sentence) {
            let lemma = singularize(&word);
            let noun = seed_words.contains(&lemma) || is_noun_candidate(&word);
            if noun {
                current.push(lemma);
            } else if !current.is_empty() {
                phrases.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            phrases.push(current);
        }

        phrases
            .into_iter()
            .map(|p| {
                let start = p.len().saturating_sub(MAX_PHRASE_WORDS);
                p[start..].to_vec()
            })
            .collect()
    }

    fn latin_ratio(reviews: &[Review]) -> f64 {
        let (latin, letters) = reviews
            .iter()
            .flat_map(|r| r.text().chars())
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(l, t), c| {
                (l + usize::from(c.is_ascii_alphabetic()), t + 1)
            });
        if letters == 0 {
            1.0
        } else {
            latin as f64 / letters as f64
        }
    }
}

impl AspectExtractor for PhraseExtractor {
    fn extract(&self, reviews: &[Review], category: &str) -> VerdictResult<AspectMap> {
        let ratio = Self::latin_ratio(reviews);
        if ratio < self.min_latin_ratio {
            return Err(AnalysisError::NlpPipelineUnavailable(format!(
                "English chunker cannot tag this text (latin ratio {:.2})",
                ratio
            )));
        }

        let seeds = seeded_aspects(category);
        let mut seed_of: HashMap<String, usize> = HashMap::new();
        for (i, seed) in seeds.iter().enumerate() {
            for term in &seed.terms {
                seed_of.entry(term.clone()).or_insert(i);
            }
        }
        let seed_words: HashSet<String> = seed_of.keys().cloned().collect();

        let mut map = AspectMap::default();
        for (idx, review) in reviews.iter().enumerate() {
            for sentence in split_sentences(review.text()) {
                for phrase in Self::chunk(&sentence, &seed_words) {
                    // Left-most seed word decides the aspect: "screen quality" is display.
                    let folded = phrase.iter().find_map(|w| seed_of.get(w).copied());
                    let mut hit = match folded {
                        Some(i) => {
                            let mut a = Aspect::new(seeds[i].name.clone());
                            a.terms = seeds[i].terms.clone();
                            a.seeded = true;
                            a
                        }
                        None => {
                            let name = phrase.join(" ");
                            let mut a = Aspect::new(name.clone());
                            a.terms.insert(name);
                            a
                        }
                    };
                    hit.reviews.insert(idx);
                    map.insert(hit);
                }
            }
        }

        let support = min_support(reviews.len());
        map.retain(|a| a.seeded || a.support() >= support);

        // Keep the best-supported discovered phrases; seeds are never dropped.
        let mut discovered: Vec<(usize, usize, String)> = map
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.seeded)
            .map(|(order, a)| (a.support(), order, a.name.clone()))
            .collect();
        if discovered.len() > MAX_DISCOVERED_ASPECTS {
            discovered.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            let keep: HashSet<String> = discovered
                .into_iter()
                .take(MAX_DISCOVERED_ASPECTS)
                .map(|(_, _, name)| name)
                .collect();
            map.retain(|a| a.seeded || keep.contains(&a.name));
        }

        debug!(
            category,
            aspects = map.len(),
            min_support = support,
            "Phrase extraction finished"
        );
        Ok(map)
    }

    fn name(&self) -> &'static str {
        "phrase"
    }
}

/// Runs `primary`, dropping to keyword matching when it reports the NLP
/// pipeline as unavailable. Other errors propagate.
pub struct FallbackExtractor {
    primary: Box<dyn AspectExtractor>,
    fallback: KeywordExtractor,
}

impl FallbackExtractor {
    pub fn new(primary: Box<dyn AspectExtractor>) -> Self {
        Self {
            primary,
            fallback: KeywordExtractor,
        }
    }
}

impl Default for FallbackExtractor {
    fn default() -> Self {
        Self::new(Box::new(PhraseExtractor::default()))
    }
}

impl AspectExtractor for FallbackExtractor {
    fn extract(&self, reviews: &[Review], category: &str) -> VerdictResult<AspectMap> {
        match self.primary.extract(reviews, category) {
            Err(AnalysisError::NlpPipelineUnavailable(reason)) => {
                warn!(
                    extractor = self.primary.name(),
                    %reason,
                    "Aspect extractor unavailable, falling back to seed keywords"
                );
                self.fallback.extract(reviews, category)
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviews(texts: &[&str]) -> Vec<Review> {
        texts.iter().filter_map(|t| Review::new(*t, None)).collect()
    }

    #[test]
    fn test_seed_terms_fold_into_seed_aspect() {
        let reviews = reviews(&["The batteries drain fast. Charging takes ages."]);
        let map = KeywordExtractor.extract(&reviews, "smartphone").unwrap();
        let battery = map.get("battery").unwrap();
        assert_eq!(battery.reviews, BTreeSet::from([0]));
        assert!(map.get("performance").is_some()); // "fast"
    }

    #[test]
    fn test_seed_kept_regardless_of_support() {
        let reviews = reviews(&[
            "Lovely screen on this one",
            "Fingerprint sensor is quick",
            "Fingerprint sensor rarely fails",
            "Decent speaker output",
            "Arrived early, good packing",
            "Box had a scratch on the fingerprint sensor",
        ]);
        let map = PhraseExtractor::default().extract(&reviews, "smartphone").unwrap();
        // "screen" appears once but is a display seed term
        assert_eq!(map.get("display").unwrap().support(), 1);
        // discovered phrase with support 3
        assert_eq!(map.get("fingerprint sensor").unwrap().support(), 3);
        // singleton non-seed phrase is dropped with >= 5 reviews
        assert!(map.get("scratch").is_none());
    }

    #[test]
    fn test_singletons_kept_for_small_review_sets() {
        let reviews = reviews(&["The fingerprint sensor is quick", "Nice weight"]);
        let map = PhraseExtractor::default().extract(&reviews, "general").unwrap();
        assert!(map.get("fingerprint sensor").is_some());
    }

    #[test]
    fn test_first_seen_order() {
        let reviews = reviews(&["Camera is sharp", "Battery is weak and the camera is fine"]);
        let map = KeywordExtractor.extract(&reviews, "smartphone").unwrap();
        assert_eq!(map.names(), vec!["camera", "battery"]);
    }

    #[test]
    fn test_aspect_matches_plural_forms() {
        let mut aspect = Aspect::new("battery");
        aspect.add_term("battery");
        assert!(aspect.matches("Both batteries died"));
        assert!(!aspect.matches("Battered box"));
    }

    struct Unavailable;

    impl AspectExtractor for Unavailable {
        fn extract(&self, _: &[Review], _: &str) -> VerdictResult<AspectMap> {
            Err(AnalysisError::NlpPipelineUnavailable("model missing".into()))
        }

        fn name(&self) -> &'static str {
            "unavailable"
        }
    }

    #[test]
    fn test_fallback_to_keywords() {
        let reviews = reviews(&["The camera is great", "Camera zoom is blurry"]);
        let extractor = FallbackExtractor::new(Box::new(Unavailable));
        let map = extractor.extract(&reviews, "smartphone").unwrap();
        assert_eq!(map.get("camera").unwrap().support(), 2);
    }

    #[test]
    fn test_non_latin_text_reports_unavailable() {
        let reviews = reviews(&["यह फोन बहुत अच्छा है और कैमरा शानदार है"]);
        let err = PhraseExtractor::default().extract(&reviews, "smartphone").unwrap_err();
        assert!(matches!(err, AnalysisError::NlpPipelineUnavailable(_)));
    }
}
