//! Live review retrieval over HTTP.
//!
//! Pages are fetched with `reqwest` under a rotating desktop user agent and
//! read with CSS selectors. Each field has several selectors, tried in
//! order, because both stores ship layout changes often.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::{clean_reviews, RawListing, RawReview, ReviewSource};
use crate::error::{AnalysisError, VerdictResult};
use crate::model::{ProductUrl, Site};

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    ]
});

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

static PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid regex"));
static RATING: Lazy<Regex> = Lazy::new(|| Regex::new(r"([1-5](?:\.\d)?)").expect("valid regex"));

/// Markers of a bot-check page instead of a product page.
const BLOCK_MARKERS: &[&str] = &[
    "Enter the characters you see below",
    "api-services-support@amazon.com",
    "Are you a human?",
];

const MAX_DESCRIPTION_PARTS: usize = 5;
const MAX_DESCRIPTION_CHARS: usize = 2000;

// ============================================================================
// Selectors
// ============================================================================

struct SiteSelectors {
    /// One element per review, holding body and star rating
    review_blocks: Vec<Selector>,
    review_body: Vec<Selector>,
    review_rating: Vec<Selector>,
    title: Vec<Selector>,
    price: Vec<Selector>,
    description: Vec<Selector>,
    brand: Vec<Selector>,
    image: Vec<Selector>,
}

fn parse_all(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
}

static AMAZON: Lazy<SiteSelectors> = Lazy::new(|| SiteSelectors {
    review_blocks: parse_all(&["div[data-hook='review']", "li[data-hook='review']"]),
    review_body: parse_all(&[
        "span[data-hook='review-body'] span",
        "div.review-text-content span",
        "span[data-hook='review-body']",
        "div[data-hook='review-collapsed'] span",
        "div.cr-original-review-text",
    ]),
    review_rating: parse_all(&[
        "i[data-hook='review-star-rating'] span.a-icon-alt",
        "i[data-hook='cmps-review-star-rating'] span.a-icon-alt",
        "span.a-icon-alt",
    ]),
    title: parse_all(&["span#productTitle", "h1#title", "h1.a-size-large"]),
    price: parse_all(&["span.a-price-whole", "span.a-offscreen", "span.a-price-current"]),
    description: parse_all(&["div#feature-bullets span", "div#productDescription", "div.a-expander-content"]),
    brand: parse_all(&["a#bylineInfo", "tr.po-brand td.a-span9 span"]),
    image: parse_all(&["img#landingImage", "meta[property='og:image']"]),
});

static FLIPKART: Lazy<SiteSelectors> = Lazy::new(|| SiteSelectors {
    review_blocks: parse_all(&["div.col.EPCmJX", "div._27M-vq", "div.col._2wzgFH"]),
    review_body: parse_all(&["div.ZmyHeo", "div.t-ZTKy", "div._6K-7Co"]),
    review_rating: parse_all(&["div.XQDdHH", "div._3LWZlK"]),
    title: parse_all(&["span.VU-ZEz", "span.B_NuCI", "h1.yhB1nd"]),
    price: parse_all(&["div.Nx9bqj", "div._30jeq3", "div._1_WHN1"]),
    description: parse_all(&["div._1AN87F div", "div._1mXcCf"]),
    brand: parse_all(&["span.mEh187"]),
    image: parse_all(&["img.DByuf4", "img._396cs4", "meta[property='og:image']"]),
});

fn selectors_for(site: Site) -> &'static SiteSelectors {
    match site {
        Site::Amazon => &AMAZON,
        Site::Flipkart => &FLIPKART,
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(root: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|s| {
        root.select(s)
            .map(element_text)
            .find(|t| !t.is_empty())
    })
}

fn first_attr(document: &Html, selectors: &[Selector], attrs: &[&str]) -> Option<String> {
    selectors.iter().find_map(|s| {
        document.select(s).next().and_then(|el| {
            attrs
                .iter()
                .find_map(|a| el.value().attr(a))
                .map(str::to_string)
        })
    })
}

pub fn parse_price(text: &str) -> Option<f64> {
    PRICE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p > 0.0)
}

pub fn parse_rating(text: &str) -> Option<f64> {
    RATING
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|r| (1.0..=5.0).contains(r))
}

fn clean_brand(raw: String) -> Option<String> {
    let brand = raw
        .trim_start_matches("Visit the ")
        .trim_start_matches("Brand: ")
        .trim_end_matches(" Store")
        .trim()
        .to_string();
    (!brand.is_empty()).then_some(brand)
}

/// Read a product page. Pure so it can run on saved pages.
pub fn parse_listing(site: Site, html: &str, max_reviews: usize) -> RawListing {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let sel = selectors_for(site);

    let title = first_text(root, &sel.title).unwrap_or_default();

    // Review blocks carry the star rating next to the body. Pages without
    // recognizable blocks fall back to bare bodies.
    let mut reviews: Vec<RawReview> = sel
        .review_blocks
        .iter()
        .map(|block_sel| {
            document
                .select(block_sel)
                .filter_map(|block| {
                    let text = first_text(block, &sel.review_body)?;
                    let rating = first_text(block, &sel.review_rating).and_then(|t| parse_rating(&t));
                    Some(RawReview::new(text, rating))
                })
                .collect::<Vec<_>>()
        })
        .find(|found| !found.is_empty())
        .unwrap_or_default();
    if reviews.is_empty() {
        reviews = sel
            .review_body
            .iter()
            .map(|s| {
                document
                    .select(s)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .map(|t| RawReview::new(t, None))
                    .collect::<Vec<_>>()
            })
            .find(|found| !found.is_empty())
            .unwrap_or_default();
    }

    let price = sel.price.iter().find_map(|s| {
        document
            .select(s)
            .map(element_text)
            .find_map(|t| parse_price(&t))
    });

    let description = sel
        .description
        .iter()
        .flat_map(|s| document.select(s).take(MAX_DESCRIPTION_PARTS).map(element_text))
        .filter(|t| t.chars().count() > 10)
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect::<String>();

    RawListing {
        title,
        category: None,
        brand: first_text(root, &sel.brand).and_then(clean_brand),
        price,
        description,
        image: first_attr(&document, &sel.image, &["src", "data-old-hires", "content"]),
        reviews: clean_reviews(reviews, max_reviews),
    }
}

// ============================================================================
// Source
// ============================================================================

pub struct HttpReviewSource {
    client: reqwest::Client,
    max_reviews: usize,
}

impl HttpReviewSource {
    pub fn new(timeout: Duration, max_reviews: usize) -> VerdictResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client, max_reviews })
    }
}

#[async_trait]
impl ReviewSource for HttpReviewSource {
    async fn fetch_reviews(&self, url: &ProductUrl) -> VerdictResult<RawListing> {
        let user_agent = *USER_AGENTS
            .choose(&mut rand::thread_rng())
            .unwrap_or(&DEFAULT_USER_AGENT);

        info!(url = %url.canonical, site = url.site.as_str(), "Fetching product page");
        let resp = self
            .client
            .get(&url.canonical)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| AnalysisError::SourceUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AnalysisError::SourceUnavailable(format!("HTTP {}", status)));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| AnalysisError::SourceUnavailable(e.to_string()))?;
        debug!(bytes = html.len(), "Fetched product page");

        if BLOCK_MARKERS.iter().any(|m| html.contains(m)) {
            warn!(url = %url.canonical, "Request was answered with a bot check");
            return Err(AnalysisError::SourceUnavailable("blocked by bot check".into()));
        }

        let listing = parse_listing(url.site, &html, self.max_reviews);
        if listing.title.is_empty() && listing.reviews.is_empty() {
            return Err(AnalysisError::SourceUnavailable(
                "page layout not recognized".into(),
            ));
        }
        info!(
            title = %listing.title,
            reviews = listing.reviews.len(),
            price = ?listing.price,
            "Parsed product page"
        );
        Ok(listing)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
