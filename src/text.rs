//! Text helpers shared by aspect extraction, sentiment scoring and the
//! recommendation vectorizer.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+|\n+").expect("valid regex"));

pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
        "it", "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with", "this",
        "they", "but", "have", "had", "what", "when", "where", "who", "which", "why", "how", "all",
        "each", "every", "both", "few", "more", "most", "other", "some", "such", "no", "nor",
        "not", "only", "own", "same", "so", "than", "too", "very", "can", "just", "should", "now",
        "also", "been", "being", "do", "does", "did", "doing", "would", "could", "might", "must",
        "shall", "about", "above", "after", "again", "against", "am", "any", "before", "below",
        "between", "into", "through", "during", "out", "over", "under", "up", "down", "then",
        "once", "here", "there", "if", "else", "while", "because", "until", "we", "you", "your",
        "our", "their", "him", "her", "them", "me", "my", "myself", "itself", "those", "these",
        "his", "i", "she", "us", "may", "get", "got", "one", "even", "still", "much", "really",
        "quite", "well", "bit", "lot", "thing", "things", "way", "day", "days", "time", "times",
        "product", "item", "buy", "bought", "purchase", "amazon", "flipkart",
    ]
    .into_iter()
    .collect()
});

/// Words that are never pluralized by a trailing `s`.
static SINGULAR_S: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "lens", "series", "bass", "glass", "gps", "ios", "plus", "status", "news", "class",
        "access", "wireless", "mattress", "stainless", "chassis", "analysis", "canvas", "always",
    ]
    .into_iter()
    .collect()
});

/// Split review text into trimmed sentences, dropping fragments under 5 chars.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|s| s.len() >= 5)
        .map(String::from)
        .collect()
}

/// Lowercase alphanumeric words, in order. Apostrophes inside words are kept
/// so negations like "doesn't" survive.
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Suffix-rule singularization, enough to fold "batteries" into "battery".
pub fn singularize(word: &str) -> String {
    let w = word.to_lowercase();
    if w.len() <= 3 || SINGULAR_S.contains(w.as_str()) {
        return w;
    }
    if let Some(stem) = w.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "ches", "shes", "xes"] {
        if w.ends_with(suffix) {
            return w[..w.len() - 2].to_string();
        }
    }
    if w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") && !w.ends_with("is") {
        return w[..w.len() - 1].to_string();
    }
    w
}

/// Terms for TF-IDF: stopwords, single characters and pure numbers removed.
pub fn content_terms(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| w.len() > 1)
        .filter(|w| !is_stop_word(w))
        .filter(|w| !w.chars().all(|c| c.is_numeric()))
        .map(|w| singularize(&w))
        .collect()
}
