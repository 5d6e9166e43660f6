//! Core records passed between pipeline stages.
//!
//! Constructors reject malformed input at the boundary (blank review text,
//! out-of-range ratings, non-finite prices) so scoring code never has to
//! second-guess a field.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, VerdictResult};

// ============================================================================
// Product identity
// ============================================================================

/// Stores the pipeline knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Amazon,
    Flipkart,
}

/// Public suffixes of the Amazon storefronts.
const AMAZON_SUFFIXES: &[&str] = &[
    "com", "in", "co.uk", "de", "fr", "it", "es", "ca", "com.au", "co.jp", "com.mx", "com.br",
    "nl", "se", "pl", "sg", "ae", "sa", "com.tr", "eg", "cn",
];

impl Site {
    /// Match the registrable domain, allowing any subdomain in front
    /// (`www.`, `m.`, `smile.`).
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.trim_end_matches('.').to_lowercase();
        let labels: Vec<&str> = host.split('.').collect();
        let is_amazon = labels.iter().enumerate().any(|(i, label)| {
            *label == "amazon" && AMAZON_SUFFIXES.contains(&labels[i + 1..].join(".").as_str())
        });
        if is_amazon {
            Some(Site::Amazon)
        } else if host == "flipkart.com" || host.ends_with(".flipkart.com") {
            Some(Site::Flipkart)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Amazon => "amazon",
            Site::Flipkart => "flipkart",
        }
    }
}

/// Cache key for a product: `<site>:<site-local id>`.
///
/// Derived only from the parts of the URL that identify the listing, so
/// tracking parameters, referral path segments and host case do not produce
/// a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed and normalized product page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUrl {
    pub site: Site,
    pub id: ProductId,
    /// Scheme + host + path, no query or fragment
    pub canonical: String,
}

impl ProductUrl {
    pub fn parse(raw: &str) -> VerdictResult<Self> {
        let trimmed = raw.trim();
        let with_scheme = if trimmed.to_lowercase().starts_with("http://")
            || trimmed.to_lowercase().starts_with("https://")
        {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed.trim_start_matches(|c: char| c == '/' || c.is_whitespace()))
        };

        let url = url::Url::parse(&with_scheme).map_err(|_| AnalysisError::InvalidUrl {
            url: raw.to_string(),
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| AnalysisError::InvalidUrl { url: raw.to_string() })?
            .to_lowercase();
        let site = Site::from_host(&host).ok_or_else(|| AnalysisError::UnsupportedSite {
            host: host.clone(),
        })?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let local = match site {
            Site::Amazon => amazon_asin(&segments),
            Site::Flipkart => url
                .query_pairs()
                .find(|(k, _)| k == "pid")
                .map(|(_, v)| v.to_uppercase())
                .or_else(|| {
                    segments
                        .iter()
                        .find(|s| s.starts_with("itm"))
                        .map(|s| s.to_lowercase())
                }),
        }
        .unwrap_or_else(|| segments.join("/").to_lowercase());

        if local.is_empty() {
            return Err(AnalysisError::InvalidUrl { url: raw.to_string() });
        }

        let canonical = format!("https://{}{}", host, url.path().trim_end_matches('/'));
        Ok(Self {
            site,
            id: ProductId(format!("{}:{}", site.as_str(), local)),
            canonical,
        })
    }
}

fn amazon_asin(segments: &[&str]) -> Option<String> {
    let is_asin = |s: &str| s.len() == 10 && s.chars().all(|c| c.is_ascii_alphanumeric());
    segments
        .windows(2)
        .find(|w| matches!(w[0], "dp" | "product" | "product-reviews") && is_asin(w[1]))
        .map(|w| w[1].to_uppercase())
}

// ============================================================================
// Reviews and products
// ============================================================================

/// A single customer review. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    text: String,
    rating: Option<f64>,
    fetched_at: Option<DateTime<Utc>>,
}

impl Review {
    /// Returns `None` for blank text. Ratings outside 1–5 are dropped.
    pub fn new(text: impl Into<String>, rating: Option<f64>) -> Option<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return None;
        }
        let rating = rating.filter(|r| {
            let valid = r.is_finite() && (1.0..=5.0).contains(r);
            if !valid {
                debug!(rating = r, "Dropping out-of-range rating");
            }
            valid
        });
        Some(Self {
            text,
            rating,
            fetched_at: None,
        })
    }

    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

/// A product listing with its reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub site: Site,
    pub url: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
    pub reviews: Vec<Review>,
}

impl Product {
    pub fn new(url: &ProductUrl, title: impl Into<String>, category: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: url.id.clone(),
            site: url.site,
            url: url.canonical.clone(),
            title: if title.trim().is_empty() {
                "Unknown Product".to_string()
            } else {
                title.trim().to_string()
            },
            description: String::new(),
            category: normalize_category(&category.into()),
            brand: None,
            price: None,
            image: None,
            reviews: Vec::new(),
        }
    }

    /// Non-finite or non-positive prices are treated as unknown.
    pub fn with_price(mut self, price: Option<f64>) -> Self {
        self.price = price.filter(|p| p.is_finite() && *p > 0.0);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_brand(mut self, brand: Option<String>) -> Self {
        self.brand = brand.filter(|b| !b.trim().is_empty());
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_reviews(mut self, reviews: Vec<Review>) -> Self {
        self.reviews = reviews;
        self
    }

    /// Mean star rating over reviews that carry one.
    pub fn mean_rating(&self) -> Option<f64> {
        let ratings: Vec<f64> = self.reviews.iter().filter_map(Review::rating).collect();
        if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        }
    }
}

pub fn normalize_category(raw: &str) -> String {
    let c = raw.trim().to_lowercase();
    if c.is_empty() {
        "general".to_string()
    } else {
        c
    }
}

// ============================================================================
// Analysis output
// ============================================================================

/// Sentiment for one aspect across all of its mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectSentiment {
    pub aspect: String,
    /// Mean compound polarity of the non-neutral mentions, in [-1, 1]
    pub polarity: f64,
    /// All mentions, neutral ones included; always >= 1
    pub mentions: usize,
    /// Mentions that cleared the neutral threshold
    pub opinionated: usize,
    /// Up to three strongly-worded sentences mentioning the aspect
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl AspectSentiment {
    pub fn is_opinionated(&self) -> bool {
        self.opinionated > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationLabel {
    #[serde(rename = "Recommended")]
    Recommended,
    #[serde(rename = "Acceptable")]
    Acceptable,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

impl RecommendationLabel {
    pub fn from_score(score: u8) -> Self {
        match score {
            70..=u8::MAX => RecommendationLabel::Recommended,
            50..=69 => RecommendationLabel::Acceptable,
            _ => RecommendationLabel::NotRecommended,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationLabel::Recommended => "Recommended",
            RecommendationLabel::Acceptable => "Acceptable",
            RecommendationLabel::NotRecommended => "Not Recommended",
        }
    }
}

impl fmt::Display for RecommendationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many reviews read positive, negative or neutral overall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Where the reviews behind an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Fetched from the store page
    Live,
    /// Category sample reviews; the score is an estimate
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub confidence: f64,
    pub data_quality: f64,
    pub reviews_used: usize,
    pub sentences: usize,
    pub low_confidence: bool,
    pub provenance: Provenance,
    pub category: String,
}

/// What the seller's description covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptionSummary {
    /// Category feature keywords found in the description
    pub key_features: Vec<String>,
    /// Fraction of the category's feature keywords mentioned
    pub feature_completeness: f64,
    /// Completeness plus a bonus for quality wording, capped at 1
    pub usability_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub product_id: ProductId,
    pub score: u8,
    pub label: RecommendationLabel,
    /// Descending polarity
    pub pros: Vec<(String, f64)>,
    /// Ascending polarity
    pub cons: Vec<(String, f64)>,
    pub aspects: Vec<AspectSentiment>,
    pub distribution: SentimentDistribution,
    pub meta: AnalysisMeta,
    pub voice_verdict: String,
    pub insight: String,
    #[serde(default)]
    pub description: DescriptionSummary,
    pub computed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn pro_names(&self) -> impl Iterator<Item = &str> {
        self.pros.iter().map(|(name, _)| name.as_str())
    }

    pub fn con_names(&self) -> impl Iterator<Item = &str> {
        self.cons.iter().map(|(name, _)| name.as_str())
    }
}

/// A product together with its analysis, borrowed from the cache.
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    pub product: &'a Product,
    pub analysis: &'a AnalysisResult,
}

/// Why an alternative is better, in numbers and in words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub score_delta: u8,
    pub pros_gained: Vec<String>,
    pub cons_reduced: Vec<String>,
    /// candidate price − query price, only when both are known
    pub price_delta: Option<f64>,
    pub category_match: bool,
    pub similarity: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub product_id: ProductId,
    pub title: String,
    pub url: String,
    pub category: String,
    pub score: u8,
    pub similarity: f64,
    pub price: Option<f64>,
    pub explanation: Explanation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amazon_id_ignores_tracking() {
        let a = ProductUrl::parse("https://www.amazon.in/Some-Phone/dp/B0ABC12345/ref=sr_1_1?keywords=x")
            .unwrap();
        let b = ProductUrl::parse("amazon.in/dp/b0abc12345").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.as_str(), "amazon:B0ABC12345");
        assert_eq!(a.site, Site::Amazon);
    }

    #[test]
    fn test_flipkart_id_from_pid() {
        let url = ProductUrl::parse(
            "https://www.flipkart.com/phone/p/itm123abc?pid=MOBG73E7GKQK4KZP&lid=LST",
        )
        .unwrap();
        assert_eq!(url.id.as_str(), "flipkart:MOBG73E7GKQK4KZP");
        assert_eq!(url.canonical, "https://www.flipkart.com/phone/p/itm123abc");
    }

    #[test]
    fn test_unsupported_host() {
        let err = ProductUrl::parse("https://www.ebay.com/itm/1234").unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedSite { .. }));
    }

    #[test]
    fn test_store_subdomains_and_lookalikes() {
        let mobile = ProductUrl::parse("https://m.amazon.in/dp/B0ABC12345").unwrap();
        assert_eq!(mobile.id.as_str(), "amazon:B0ABC12345");
        let smile = ProductUrl::parse("smile.amazon.co.uk/gp/product/B0ABC12345").unwrap();
        assert_eq!(smile.site, Site::Amazon);
        let flipkart = ProductUrl::parse("https://dl.flipkart.com/p/itm1?pid=MOB123").unwrap();
        assert_eq!(flipkart.site, Site::Flipkart);

        for host in ["amazon.evil-phish.com", "amazon.in.evil.com", "notflipkart.com", "flipkart.com.evil.io"] {
            let err = ProductUrl::parse(&format!("https://{}/dp/B0ABC12345", host)).unwrap_err();
            assert!(matches!(err, AnalysisError::UnsupportedSite { .. }), "{} accepted", host);
        }
    }

    #[test]
    fn test_review_drops_bad_rating() {
        let review = Review::new("Decent phone overall", Some(7.0)).unwrap();
        assert_eq!(review.rating(), None);
        assert!(Review::new("   ", Some(4.0)).is_none());
    }

    #[test]
    fn test_label_thresholds() {
        assert_eq!(RecommendationLabel::from_score(100), RecommendationLabel::Recommended);
        assert_eq!(RecommendationLabel::from_score(70), RecommendationLabel::Recommended);
        assert_eq!(RecommendationLabel::from_score(69), RecommendationLabel::Acceptable);
        assert_eq!(RecommendationLabel::from_score(50), RecommendationLabel::Acceptable);
        assert_eq!(RecommendationLabel::from_score(49), RecommendationLabel::NotRecommended);
        assert_eq!(RecommendationLabel::from_score(0), RecommendationLabel::NotRecommended);
    }

    #[test]
    fn test_price_rejects_nan() {
        let url = ProductUrl::parse("https://www.amazon.in/dp/B0ABC12345").unwrap();
        let product = Product::new(&url, "Phone", "").with_price(Some(f64::NAN));
        assert_eq!(product.price, None);
        assert_eq!(product.category, "general");
    }
}
