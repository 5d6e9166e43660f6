//! Where reviews come from.
//!
//! A [`ReviewSource`] turns a product URL into a [`RawListing`]: the page
//! metadata plus whatever reviews it could read. Sources never score
//! anything; they only fetch, clean and classify.

pub mod http;
pub mod sample;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::VerdictResult;
use crate::model::{Product, ProductUrl, Review};
use crate::text::words;

pub use http::HttpReviewSource;
pub use sample::SampleReviewSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
    pub text: String,
    pub rating: Option<f64>,
}

impl RawReview {
    pub fn new(text: impl Into<String>, rating: Option<f64>) -> Self {
        Self {
            text: text.into(),
            rating,
        }
    }
}

/// Everything a source could read from a product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    /// `None` when the page gives no category; detected from the text then
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub description: String,
    pub image: Option<String>,
    pub reviews: Vec<RawReview>,
}

impl RawListing {
    /// Build the validated [`Product`], dropping reviews with blank text
    /// and keeping at most `max_reviews`.
    pub fn into_product(self, url: &ProductUrl, max_reviews: usize) -> Product {
        let category = self
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| detect_category(&url.canonical, &self.title, &self.description));
        let now = chrono::Utc::now();
        let reviews: Vec<Review> = self
            .reviews
            .into_iter()
            .filter_map(|r| Review::new(r.text, r.rating))
            .map(|r| r.fetched_at(now))
            .take(max_reviews)
            .collect();

        Product::new(url, self.title, category)
            .with_description(self.description)
            .with_brand(self.brand)
            .with_price(self.price)
            .with_image(self.image)
            .with_reviews(reviews)
    }
}

#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch page metadata and reviews. Fails with `SourceUnavailable` when
    /// the page cannot be fetched or read.
    async fn fetch_reviews(&self, url: &ProductUrl) -> VerdictResult<RawListing>;

    fn name(&self) -> &'static str;
}

// ============================================================================
// Category detection
// ============================================================================

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("smartphone", &["phone", "mobile", "smartphone", "iphone", "galaxy", "pixel", "oneplus", "redmi"]),
    ("laptop", &["laptop", "notebook", "macbook", "thinkpad", "chromebook", "gaming laptop"]),
    ("tv", &["tv", "television", "smart tv", "oled tv", "qled", "4k tv"]),
    ("headphones", &["headphones", "headphone", "earphones", "earbuds", "airpods", "headset"]),
    ("camera", &["camera", "dslr", "mirrorless", "photography"]),
    ("tablet", &["tablet", "ipad", "kindle"]),
    ("watch", &["watch", "smartwatch", "fitness tracker", "apple watch"]),
];

/// Guess the category from URL, title and description keywords. Keywords
/// match whole words, so "headphones" never counts as a phone.
pub fn detect_category(url: &str, title: &str, description: &str) -> String {
    let haystack = format!(" {} ", words(&format!("{} {} {}", url, title, description)).join(" "));
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords
            .iter()
            .any(|k| haystack.contains(&format!(" {} ", k)))
        {
            return category.to_string();
        }
    }
    "general".to_string()
}

// ============================================================================
// Review cleaning
// ============================================================================

const MIN_REVIEW_CHARS: usize = 20;
const MAX_REVIEW_CHARS: usize = 1000;

/// Page chrome that ends up inside review containers.
const CHROME_PHRASES: &[&str] = &[
    "report abuse",
    "verified purchase",
    "customer images",
    "see all photos",
    "read more",
    "show less",
    "top review",
    "people found this helpful",
];

/// Trim, length-filter, drop page chrome and case-insensitive duplicates,
/// keep at most `cap`.
pub fn clean_reviews(raw: Vec<RawReview>, cap: usize) -> Vec<RawReview> {
    let before = raw.len();
    let mut seen = HashSet::new();
    let cleaned: Vec<RawReview> = raw
        .into_iter()
        .map(|r| RawReview {
            text: r.text.split_whitespace().collect::<Vec<_>>().join(" "),
            rating: r.rating,
        })
        .filter(|r| (MIN_REVIEW_CHARS..=MAX_REVIEW_CHARS).contains(&r.text.chars().count()))
        .filter(|r| {
            let lower = r.text.to_lowercase();
            !CHROME_PHRASES.iter().any(|p| lower.contains(p))
        })
        .filter(|r| seen.insert(r.text.to_lowercase()))
        .take(cap)
        .collect();
    debug!(before, after = cleaned.len(), "Cleaned reviews");
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_category() {
        assert_eq!(detect_category("https://www.amazon.in/OnePlus-Nord/dp/B0X", "", ""), "smartphone");
        assert_eq!(detect_category("", "Sony WH-1000XM5 Wireless Headphones", ""), "headphones");
        assert_eq!(detect_category("", "Samsung 55 inch Smart TV", ""), "tv");
        assert_eq!(detect_category("", "Stainless steel kettle", "1.5 litre"), "general");
    }

    #[test]
    fn test_clean_reviews() {
        let raw = vec![
            RawReview::new("  Great   phone, battery lasts all day  ", Some(5.0)),
            RawReview::new("GREAT phone, battery lasts all day", Some(4.0)),
            RawReview::new("too short", None),
            RawReview::new("Report abuse | 12 people found this helpful", None),
            RawReview::new("x".repeat(1200), None),
            RawReview::new("Camera is a bit soft in low light", Some(3.0)),
        ];
        let cleaned = clean_reviews(raw, 50);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].text, "Great phone, battery lasts all day");
        assert_eq!(cleaned[0].rating, Some(5.0));
    }

    #[test]
    fn test_into_product_detects_category_and_caps() {
        let url = ProductUrl::parse("https://www.amazon.in/dp/B0ABC12345").unwrap();
        let listing = RawListing {
            title: "Apple iPad 10th Gen".into(),
            reviews: (0..10).map(|i| RawReview::new(format!("Review number {}", i), Some(4.0))).collect(),
            ..Default::default()
        };
        let product = listing.into_product(&url, 3);
        assert_eq!(product.category, "tablet");
        assert_eq!(product.reviews.len(), 3);
    }
}
